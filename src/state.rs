//! Application state shared across all request handlers

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::store::FormStore;
use crate::upstream::FormGenerator;

/// Shared handles given to every handler
///
/// The store sits behind a single mutex: there is exactly one writer at a
/// time, so no operation can be observed half applied.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<FormStore>>,
    pub generator: Arc<dyn FormGenerator>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: FormStore, generator: Arc<dyn FormGenerator>, config: AppConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            generator,
            config: Arc::new(config),
        }
    }
}
