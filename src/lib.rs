//! The membership pages of the sailing association: the member register,
//! payments, roles and sailing crews, plus logins for members.
//!
//! Pages are rendered on the server with [askama] and forms post back to the
//! same routes; see [routes] for the layout of the site.

use anyhow::Context;
use axum::middleware::from_fn;
use axum::Router;
use time::Duration;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::middleware::verify_csrf;
use crate::state::AppState;

pub mod auth;
pub mod config;
pub mod db;
pub mod deploy;
pub mod email;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;
pub mod turnstile;
pub mod util;

/// Logged-in members stay logged in as long as they come back within this time.
pub const SESSION_INACTIVITY: Duration = Duration::hours(8);

/// Builds the whole site: routes, the CSRF check and sessions stored next to
/// the rest of the data.
pub async fn build_app(state: AppState) -> anyhow::Result<Router> {
    let store = SqliteStore::new(state.pool.clone());
    store
        .migrate()
        .await
        .context("Failed to create the session table")?;

    let session_layer = SessionManagerLayer::new(store)
        .with_secure(state.config.cookie_secure)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(SESSION_INACTIVITY));

    Ok(routes::router(state.clone())
        .layer(from_fn(verify_csrf))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
