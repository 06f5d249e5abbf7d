use crate::api::Client;
use crate::poll::PollConfig;
use std::sync::Arc;

/// Shared with every resource and data source through `configure`
#[derive(Clone)]
pub struct PrismaCloudProviderData {
    pub client: Arc<Client>,
    pub poll: PollConfig,
}

impl PrismaCloudProviderData {
    pub fn new(client: Client, poll: PollConfig) -> Self {
        Self {
            client: Arc::new(client),
            poll,
        }
    }
}
