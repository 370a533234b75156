use std::sync::Arc;

use crate::realtime::RealtimeHub;

use super::{aliases::DbPool, config::Config};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub http_client: reqwest::Client,
    pub realtime: RealtimeHub,
    pub config: Arc<Config>,
}
