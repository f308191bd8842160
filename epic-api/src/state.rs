//! Shared application state for Axum routers.

use std::sync::Arc;

use epic_storage::EpicStore;

use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::render::{ReportRenderer, TextReportRenderer};

/// Store handle shared by every route.
pub type SharedStore = Arc<dyn EpicStore>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub auth: Arc<AuthConfig>,
    pub config: Arc<ApiConfig>,
    /// Turns a built report into a downloadable document.
    pub renderer: Arc<dyn ReportRenderer>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(store: SharedStore, auth: AuthConfig, config: ApiConfig) -> Self {
        Self {
            store,
            auth: Arc::new(auth),
            config: Arc::new(config),
            renderer: Arc::new(TextReportRenderer),
            start_time: std::time::Instant::now(),
        }
    }
}

// Each field can be taken on its own with `State<T>`.
macro_rules! state_field {
    ($($field:ident: $ty:ty),* $(,)?) => {
        $(
            impl axum::extract::FromRef<AppState> for $ty {
                fn from_ref(state: &AppState) -> Self {
                    state.$field.clone()
                }
            }
        )*
    };
}

state_field! {
    store: SharedStore,
    auth: Arc<AuthConfig>,
    config: Arc<ApiConfig>,
    renderer: Arc<dyn ReportRenderer>,
    start_time: std::time::Instant,
}
