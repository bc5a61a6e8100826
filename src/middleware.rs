//! Request gates: the CSRF check on every form post, and the login and admin
//! requirements for the member and admin parts of the site.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tower_sessions::Session;

use crate::error::{AppError, AppResult};
use crate::models::member::Member;
use crate::session::{self, FlashKind};
use crate::state::AppState;

pub const CSRF_FIELD: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Paths that authenticate with a key of their own instead of a session
const CSRF_EXEMPT: &[&str] = &["/deploy"];

/// Forms on this site are small; anything bigger is refused outright.
const MAX_FORM_BYTES: usize = 64 * 1024;

/// The logged-in member, available to handlers behind [require_member] as an
/// `Extension<CurrentMember>`.
#[derive(Clone, Debug)]
pub struct CurrentMember(pub Member);

fn changes_state(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Finds the CSRF token in an urlencoded form body. Tokens are hex, so the
/// value never needs percent-decoding.
fn token_in_form(body: &[u8]) -> Option<&str> {
    std::str::from_utf8(body)
        .ok()?
        .split('&')
        .find_map(|pair| pair.strip_prefix(CSRF_FIELD)?.strip_prefix('='))
}

/// Rejects state-changing requests that don't carry the session's CSRF token,
/// either in the `csrf_token` form field or the `X-CSRF-Token` header.
pub async fn verify_csrf(session: Session, request: Request, next: Next) -> Response {
    if !changes_state(request.method()) || CSRF_EXEMPT.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    match check_csrf(&session, request).await {
        Ok(request) => next.run(request).await,
        Err(error) => error.into_response(),
    }
}

async fn check_csrf(session: &Session, request: Request) -> AppResult<Request> {
    let header = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    if let Some(token) = header {
        return if session::csrf_matches(session, &token).await? {
            Ok(request)
        } else {
            tracing::info!(path = %request.uri().path(), "wrong CSRF header");
            Err(AppError::InvalidCsrf)
        };
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|_| AppError::bad_request("The form is too large"))?;

    let matches = match token_in_form(&bytes) {
        Some(token) => session::csrf_matches(session, token).await?,
        None => false,
    };
    if !matches {
        tracing::info!(path = %parts.uri.path(), "missing or wrong CSRF token");
        return Err(AppError::InvalidCsrf);
    }

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

/// Only lets logged-in members through. Anyone else is sent to the login page,
/// which returns them here afterwards.
pub async fn require_member(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let member = match session::member_id(&session).await? {
        Some(id) => Member::with_id_opt(id, &state.pool).await?,
        None => None,
    };

    let Some(member) = member else {
        if request.method() == Method::GET {
            let path = request
                .uri()
                .path_and_query()
                .map(|path| path.as_str())
                .unwrap_or("/");
            session::set_return_to(&session, path).await?;
        }
        session::flash(&session, FlashKind::Info, "Please log in first").await?;
        return Err(AppError::Unauthorized);
    };

    request.extensions_mut().insert(CurrentMember(member));
    Ok(next.run(request).await)
}

/// Only lets administrators through. Must sit inside [require_member].
pub async fn require_admin(request: Request, next: Next) -> Response {
    match request.extensions().get::<CurrentMember>() {
        Some(CurrentMember(member)) if member.is_admin => next.run(request).await,
        Some(CurrentMember(member)) => {
            tracing::info!(member = member.id, path = %request.uri().path(), "admin page refused");
            AppError::Forbidden.into_response()
        }
        None => {
            tracing::error!(path = %request.uri().path(), "admin gate used without the member gate");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
