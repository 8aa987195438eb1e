//! Server entry: bind and serve until shutdown.

use std::sync::Arc;

use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Bind the observer server and serve forever.
///
/// # Errors
///
/// Returns [`std::io::Error`] when the bind or accept loop fails.
pub async fn serve(state: Arc<AppState>, bind: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %bind, "observer server listening");
    axum::serve(listener, build_router(state)).await
}
