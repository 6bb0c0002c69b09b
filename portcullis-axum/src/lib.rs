//! # Portcullis Axum Integration
//!
//! This crate exposes the portcullis engine over HTTP as a small set of Axum
//! routes, for deployments where callers live in other processes:
//!
//! - `POST /evaluate` — decide whether a guarded action may proceed
//! - `POST /complete` — report the outcome of a guarded action
//! - `POST /reset` — administrative override for one key
//! - `GET /dashboard?hours=` — operator-facing security summary
//! - `GET /health` — storage health check
//!
//! Blocked verdicts are ordinary 200 responses with `allow: false`; only
//! malformed requests, unknown action kinds, and engine faults map to error
//! statuses.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::Router;
//! use portcullis::PortcullisBuilder;
//! use portcullis_axum::routes;
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Arc::new(PortcullisBuilder::new().with_memory().build().unwrap());
//!
//!     let app = Router::new().nest("/guard", routes(engine));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

mod error;
mod routes;
mod types;

pub use error::{ApiError, Result};
pub use routes::create_router;
pub use types::{
    CompleteRequest, DashboardQuery, EvaluateRequest, HealthResponse, MessageResponse,
    ResetRequest, VerdictResponse,
};

use axum::Router;
use portcullis::Portcullis;
use portcullis_core::repositories::RepositoryProvider;
use std::sync::Arc;

/// Create rate-limiting routes for your Axum application.
///
/// The returned router can be nested into an application at any path.
pub fn routes<R>(engine: Arc<Portcullis<R>>) -> Router
where
    R: RepositoryProvider + 'static,
{
    create_router(engine)
}
