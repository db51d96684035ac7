//! HTTP control surface.
//!
//! | Route              | Action                                  |
//! |--------------------|-----------------------------------------|
//! | `GET /api/v1/start`  | build the pipeline and start it       |
//! | `GET /api/v1/stop`   | stop it and report run counters       |
//! | `GET /api/v1/search` | query the flight database             |
//! | `GET /api/v1/status` | scheduler state                       |

pub mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::scheduler::Scheduler;
use crate::sink::SinkKind;

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState {
    /// The pipeline controlled by start/stop.
    pub scheduler: Scheduler,
    /// Configuration used to build pipelines and locate the database.
    pub config: Config,
}

impl AppState {
    /// Create state with an idle scheduler.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            scheduler: Scheduler::new(),
            config,
        }
    }
}

/// API v1 routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/start", get(handlers::start))
        .route("/api/v1/stop", get(handlers::stop))
        .route("/api/v1/search", get(handlers::search))
        .route("/api/v1/status", get(handlers::status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the control surface on `config.http.bind` until `shutdown` resolves,
/// then stop any running pipeline.
///
/// # Errors
///
/// Returns a configuration error unless the database sink is selected, since
/// search reads the database the pipeline writes. Returns an I/O error if the
/// address cannot be bound.
pub async fn serve<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if config.tracker.sink != SinkKind::Db {
        return Err(Error::config(format!(
            "the HTTP control surface requires the {} sink, configured sink is {}",
            SinkKind::Db,
            config.tracker.sink
        )));
    }

    let addr = config.http.bind;
    let state = Arc::new(AppState::new(config));
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP control surface: http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    if let Ok(stats) = state.scheduler.stop().await {
        info!(cycles = stats.cycles, "Pipeline stopped on shutdown");
    }
    Ok(())
}
