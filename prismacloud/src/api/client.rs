use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::common::{parse_status_header, ApiErrorDetails, ApiQueryParams, AUTH_HEADER, STATUS_HEADER};
use super::error::ApiError;
use crate::config::ProviderConfig;

/// Prisma Cloud API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    token: RwLock<Option<String>>,
    retry_config: RetryConfig,
}

#[derive(Clone, Serialize)]
struct Credentials {
    username: String,
    password: String,
    #[serde(rename = "customerName", skip_serializing_if = "Option::is_none")]
    customer_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: String,
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 90,
        }
    }
}

impl Client {
    /// Create a client from resolved provider settings
    pub fn new(config: &ProviderConfig) -> Result<Self, ApiError> {
        let base_url = config
            .base_url()
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;

        let retry_config = RetryConfig {
            max_retries: config.max_retries,
            max_backoff_ms: config.retry_max_delay,
            timeout_seconds: config.timeout,
            ..Default::default()
        };

        Self::with_config(
            &base_url,
            &config.username,
            &config.password,
            config.customer_name.clone(),
            config.skip_ssl_cert_verification,
            retry_config,
        )
    }

    pub fn with_config(
        base_url: &str,
        username: &str,
        password: &str,
        customer_name: Option<String>,
        insecure: bool,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(std::time::Duration::from_secs(retry_config.timeout_seconds))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url: base_url.trim_end_matches('/').to_string(),
                credentials: Credentials {
                    username: username.to_string(),
                    password: password.to_string(),
                    customer_name,
                },
                token: RwLock::new(None),
                retry_config,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Log in and store the session token, replacing any current one
    pub async fn login(&self) -> Result<String, ApiError> {
        let mut token = self.inner.token.write().await;
        self.login_locked(&mut token).await
    }

    async fn login_locked(&self, token: &mut Option<String>) -> Result<String, ApiError> {
        let url = format!("{}/login", self.inner.base_url);

        tracing::debug!("POST request to: {}", url);

        let response = self
            .inner
            .http_client
            .post(&url)
            .json(&self.inner.credentials)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::AuthError(format!("HTTP {}: {}", status, text)));
        }

        let login: LoginResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::ParseError(e.to_string()))?;
        if login.token.is_empty() {
            return Err(ApiError::AuthError(format!(
                "no token in login response: {}",
                login.message
            )));
        }

        tracing::info!("Logged in to {}", self.inner.base_url);
        *token = Some(login.token.clone());
        Ok(login.token)
    }

    /// Current session token, logging in first when there is none
    async fn token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.inner.token.read().await.as_ref() {
            return Ok(token.clone());
        }

        // Concurrent first requests queue here; only the first one logs in
        let mut token = self.inner.token.write().await;
        if let Some(token) = token.as_ref() {
            return Ok(token.clone());
        }
        self.login_locked(&mut token).await
    }

    /// Execute a GET request with retry logic
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        self.execute_with_retry(
            |token| async move {
                let url = format!("{}{}", self.inner.base_url, path);

                tracing::debug!("GET request to: {}", url);

                self.inner
                    .http_client
                    .get(&url)
                    .header(AUTH_HEADER, token)
                    .send()
                    .await
            },
            path,
        )
        .await
    }

    /// Execute a GET request with query parameters
    pub async fn get_with_params<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &ApiQueryParams,
    ) -> Result<T, ApiError> {
        let full_path = format!("{}{}", path, params.to_query_string());
        self.get(&full_path).await
    }

    /// Execute a POST request with retry logic
    pub async fn post<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute_with_retry(
            |token| async move {
                let url = format!("{}{}", self.inner.base_url, path);

                tracing::debug!("POST request to: {}", url);

                self.inner
                    .http_client
                    .post(&url)
                    .header(AUTH_HEADER, token)
                    .json(body)
                    .send()
                    .await
            },
            path,
        )
        .await
    }

    /// Execute a PUT request with retry logic
    pub async fn put<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute_with_retry(
            |token| async move {
                let url = format!("{}{}", self.inner.base_url, path);

                tracing::debug!("PUT request to: {}", url);

                self.inner
                    .http_client
                    .put(&url)
                    .header(AUTH_HEADER, token)
                    .json(body)
                    .send()
                    .await
            },
            path,
        )
        .await
    }

    /// Execute a PATCH request with retry logic
    pub async fn patch<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute_with_retry(
            |token| async move {
                let url = format!("{}{}", self.inner.base_url, path);

                tracing::debug!("PATCH request to: {}", url);

                self.inner
                    .http_client
                    .patch(&url)
                    .header(AUTH_HEADER, token)
                    .json(body)
                    .send()
                    .await
            },
            path,
        )
        .await
    }

    /// Execute a DELETE request with retry logic
    pub async fn delete<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        self.execute_with_retry(
            |token| async move {
                let url = format!("{}{}", self.inner.base_url, path);

                tracing::debug!("DELETE request to: {}", url);

                self.inner
                    .http_client
                    .delete(&url)
                    .header(AUTH_HEADER, token)
                    .send()
                    .await
            },
            path,
        )
        .await
    }

    pub fn account_groups(&self) -> super::account_group::AccountGroupsApi<'_> {
        super::account_group::AccountGroupsApi::new(self)
    }

    pub fn cloud_accounts(&self) -> super::cloud_account::CloudAccountsApi<'_> {
        super::cloud_account::CloudAccountsApi::new(self)
    }

    pub fn policies(&self) -> super::policy::PoliciesApi<'_> {
        super::policy::PoliciesApi::new(self)
    }

    pub fn alert_rules(&self) -> super::alert_rule::AlertRulesApi<'_> {
        super::alert_rule::AlertRulesApi::new(self)
    }

    pub fn compliance(&self) -> super::compliance::ComplianceApi<'_> {
        super::compliance::ComplianceApi::new(self)
    }

    pub fn integrations(&self) -> super::integration::IntegrationsApi<'_> {
        super::integration::IntegrationsApi::new(self)
    }

    pub fn reports(&self) -> super::report::ReportsApi<'_> {
        super::report::ReportsApi::new(self)
    }

    pub fn rql(&self) -> super::rql::RqlApi<'_> {
        super::rql::RqlApi::new(self)
    }

    pub fn user_roles(&self) -> super::user_role::UserRolesApi<'_> {
        super::user_role::UserRolesApi::new(self)
    }

    pub fn settings(&self) -> super::settings::SettingsApi<'_> {
        super::settings::SettingsApi::new(self)
    }

    /// Execute request with retry logic
    ///
    /// `request_fn` receives the session token. A 401 triggers one fresh
    /// login and a replay that does not count as a retry.
    async fn execute_with_retry<F, Fut, T>(&self, request_fn: F, path: &str) -> Result<T, ApiError>
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
        T: for<'de> Deserialize<'de>,
    {
        let mut attempt = 0;
        let mut last_error = None;
        let mut relogged = false;

        while attempt <= self.inner.retry_config.max_retries {
            if attempt > 0 {
                let backoff = std::cmp::min(
                    self.inner
                        .retry_config
                        .initial_backoff_ms
                        .saturating_mul(2_u64.saturating_pow(attempt - 1)),
                    self.inner.retry_config.max_backoff_ms,
                );
                tracing::warn!(
                    "Retrying request to {} after {}ms (attempt {})",
                    path,
                    backoff,
                    attempt
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(backoff)).await;
            }

            let token = self.token().await?;

            match request_fn(token).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return self.parse_success_response(response).await;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        if relogged {
                            return Err(ApiError::AuthError(format!(
                                "request to {} rejected after a fresh login",
                                path
                            )));
                        }
                        tracing::info!("Session token rejected, logging in again");
                        relogged = true;
                        self.login().await?;
                        continue;
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if status.is_server_error() && !has_not_found_status(&response) {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return self.handle_error_response(response, path).await;
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error =
                            Some(ApiError::Timeout(self.inner.retry_config.timeout_seconds));
                    } else if e.is_connect() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(ApiError::RequestError(e));
                    }
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Parse successful response; an empty body reads as JSON null
    async fn parse_success_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::debug!("API response body: {}", text);

        let body = if text.trim().is_empty() { "null" } else { &text };

        serde_json::from_str::<T>(body).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    /// Handle error response
    async fn handle_error_response<T>(
        &self,
        response: reqwest::Response,
        path: &str,
    ) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let statuses = response
            .headers()
            .get(STATUS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(parse_status_header)
            .unwrap_or_default();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status == 404 || statuses.iter().any(|s| s.is_not_found()) {
            tracing::debug!("Object not found at {}", path);
            return Err(ApiError::ObjectNotFound(path.to_string()));
        }

        let message = match statuses.first() {
            Some(first) if text.is_empty() => first.i18n_key.clone(),
            _ => text,
        };

        Err(ApiError::ApiError {
            status,
            message,
            details: (!statuses.is_empty()).then(|| Box::new(ApiErrorDetails { statuses })),
        })
    }
}

fn has_not_found_status(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(STATUS_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| parse_status_header(v).iter().any(|s| s.is_not_found()))
        .unwrap_or(false)
}
