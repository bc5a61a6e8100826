//! All pages of the site, grouped by who may see them.
//!
//! * Public pages: logging in, registering, activating a login and resetting a
//!   password, plus the health check and deploy webhook.
//! * Member pages: the dashboard, the member's own profile and the sailings.
//! * Admin pages: the member register, payments, roles and arranging sailings.
//!
//! Every form post passes the CSRF check in [verify_csrf](crate::middleware::verify_csrf).

use askama::Template;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_sessions::Session;

use crate::error::AppResult;
use crate::middleware::{require_admin, require_member};
use crate::session::{self, FlashKind};
use crate::state::AppState;

pub mod auth;
pub mod home;
pub mod members;
pub mod misc;
pub mod payments;
pub mod roles;
pub mod sailings;

pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/activate/{token}", get(auth::activate))
        .route(
            "/forgot-password",
            get(auth::forgot_password_page).post(auth::forgot_password),
        )
        .route(
            "/reset-password/{token}",
            get(auth::reset_password_page).post(auth::reset_password),
        )
        .route("/health", get(misc::health))
        .route("/deploy", post(misc::deploy));

    let members = Router::new()
        .route("/", get(home::dashboard))
        .route("/logout", post(auth::logout))
        .route("/profile", get(home::profile_page).post(home::update_profile))
        .route("/sailings", get(sailings::list))
        .route("/sailings/{id}", get(sailings::show))
        .route_layer(from_fn_with_state(state.clone(), require_member));

    let admin = Router::new()
        .route("/members", get(members::list))
        .route("/members/new", get(members::new_page).post(members::create))
        .route("/members/{id}", get(members::show))
        .route("/members/{id}/edit", get(members::edit_page).post(members::update))
        .route("/members/{id}/delete", post(members::delete))
        .route("/members/{id}/roles", post(members::add_role))
        .route(
            "/members/{id}/roles/{role_id}/delete",
            post(members::remove_role),
        )
        .route("/members/{id}/payments", post(payments::create))
        .route("/payments", get(payments::list))
        .route("/payments/{id}/delete", post(payments::delete))
        .route("/sailings/new", get(sailings::new_page).post(sailings::create))
        .route("/sailings/{id}/edit", get(sailings::edit_page).post(sailings::update))
        .route("/sailings/{id}/delete", post(sailings::delete))
        .route("/sailings/{id}/participants", post(sailings::add_participant))
        .route(
            "/sailings/{id}/participants/{member_id}/delete",
            post(sailings::remove_participant),
        )
        .route("/roles", get(roles::list).post(roles::create))
        .route("/roles/{id}/edit", get(roles::edit_page).post(roles::update))
        .route("/roles/{id}/delete", post(roles::delete))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state, require_member));

    public.merge(members).merge(admin)
}

pub(crate) fn render(template: impl Template) -> AppResult<Html<String>> {
    Ok(Html(template.render()?))
}

/// Flashes a success message and moves on to `to`.
pub(crate) async fn done(session: &Session, message: impl Into<String>, to: &str) -> AppResult<Response> {
    session::flash(session, FlashKind::Success, message).await?;
    Ok(Redirect::to(to).into_response())
}

/// Finishes a form post. Errors the member can fix are flashed on the page
/// at `back`; anything else becomes an error page.
pub(crate) async fn back_on_error(
    session: &Session,
    back: &str,
    result: AppResult<Response>,
) -> AppResult<Response> {
    match result {
        Err(error) if error.is_user_facing() => {
            tracing::debug!(%error, back, "form rejected");
            session::flash(session, FlashKind::Error, error.public_message()).await?;
            Ok(Redirect::to(back).into_response())
        }
        other => other,
    }
}
