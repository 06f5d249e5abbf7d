//! Prisma Cloud REST API client
//!
//! `Client` owns the HTTP connection pool, the session token and the retry
//! policy. Each API area hangs off it as a borrowed accessor, for example
//! `client.policies().get(id)`.

pub mod client;
pub mod common;
pub mod error;

pub mod account_group;
pub mod alert_rule;
pub mod cloud_account;
pub mod compliance;
pub mod integration;
pub mod policy;
pub mod report;
pub mod rql;
pub mod settings;
pub mod user_role;

pub use client::{Client, RetryConfig};
pub use common::{ApiQueryParams, TimeRange, TimeRangeValue};
pub use error::ApiError;
