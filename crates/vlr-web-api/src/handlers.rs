use axum::{extract::State, response::Redirect};
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

/// `GET /` sends visitors to the documentation page.
pub async fn root(State(state): State<AppState>) -> Redirect {
    let target = state.config.docs.docs_index();
    debug!("GET / redirecting to {}", target);
    Redirect::temporary(&target)
}
