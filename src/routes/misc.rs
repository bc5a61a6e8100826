use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::deploy::DeployFlag;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::util::constant_time_eq;

pub const DEPLOY_KEY_HEADER: &str = "x-deploy-key";

/// Answers once the database does.
pub async fn health(State(state): State<AppState>) -> AppResult<&'static str> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;
    Ok("OK")
}

/// Webhook for the code host: raises the deploy flag when called with the
/// configured key. The route doesn't exist unless a key is configured.
pub async fn deploy(State(state): State<AppState>, headers: HeaderMap) -> AppResult<StatusCode> {
    let Some(expected) = &state.config.deploy_key else {
        return Err(AppError::NotFound);
    };
    let given = headers
        .get(DEPLOY_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if !given.is_some_and(|given| constant_time_eq(given.as_bytes(), expected.as_bytes())) {
        tracing::warn!("deploy webhook called with a wrong key");
        return Err(AppError::Forbidden);
    }

    DeployFlag::new(&state.config.deploy_flag_path)
        .raise("webhook")
        .await?;
    tracing::info!(path = %state.config.deploy_flag_path.display(), "deploy flag raised");

    Ok(StatusCode::NO_CONTENT)
}
