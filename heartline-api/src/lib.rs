use std::sync::Arc;

use heartline_shared::middleware::TokenVerifier;

pub mod config;
pub mod domain;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod schema;
pub mod services;
pub mod storage;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

use config::AppConfig;
use realtime::{FanoutHealth, MessageFanout};
use storage::PhotoStorage;
use store::Store;

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub photos: Arc<dyn PhotoStorage>,
    pub fanout: Arc<dyn MessageFanout>,
    /// Present when delivery depends on an external broker.
    pub fanout_health: Option<Arc<dyn FanoutHealth>>,
    pub verifier: TokenVerifier,
}
