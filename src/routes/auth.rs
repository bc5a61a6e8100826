use askama::Template;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use tower_sessions::Session;

use crate::auth::Registration;
use crate::error::AppResult;
use crate::routes::{back_on_error, done, render};
use crate::session::{self, FlashKind, PageContext};
use crate::state::AppState;

/// The visitor's address as seen by Cloudflare or the reverse proxy
fn client_ip(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("cf-connecting-ip")
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
}

async fn public_page(state: &AppState, session: &Session) -> AppResult<PageContext> {
    Ok(PageContext::load(session, None)
        .await?
        .with_turnstile(state.turnstile.site_key()))
}

#[derive(Template)]
#[template(path = "auth/login.html")]
struct LoginPage {
    page: PageContext,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginForm {
    email: String,
    password: String,
    #[serde(rename = "cf-turnstile-response")]
    turnstile_response: Option<String>,
}

pub async fn login_page(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    if session::member_id(&session).await?.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let page = public_page(&state, &session).await?;
    Ok(render(LoginPage { page })?.into_response())
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        state
            .turnstile
            .verify(form.turnstile_response.as_deref(), client_ip(&headers))
            .await?;
        let member = crate::auth::login(&state, &form.email, &form.password).await?;

        let return_to = session::take_return_to(&session).await?;
        session::log_in(&session, &member).await?;
        done(&session, format!("Welcome back, {}!", member.first_name), &return_to).await
    }
    .await;

    back_on_error(&session, "/login", result).await
}

pub async fn logout(session: Session) -> AppResult<Response> {
    session::log_out(&session).await?;
    session::flash(&session, FlashKind::Info, "You are logged out").await?;
    Ok(Redirect::to("/login").into_response())
}

#[derive(Template)]
#[template(path = "auth/register.html")]
struct RegisterPage {
    page: PageContext,
    min_password_length: usize,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RegisterForm {
    email: String,
    password: String,
    password_confirmation: String,
    #[serde(rename = "cf-turnstile-response")]
    turnstile_response: Option<String>,
}

pub async fn register_page(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Html<String>> {
    render(RegisterPage {
        page: public_page(&state, &session).await?,
        min_password_length: crate::util::MIN_PASSWORD_LENGTH,
    })
}

pub async fn register(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        state
            .turnstile
            .verify(form.turnstile_response.as_deref(), client_ip(&headers))
            .await?;
        let registration = Registration {
            email: form.email,
            password: form.password,
            password_confirmation: form.password_confirmation,
        };
        crate::auth::register(&state, registration).await?;

        session::flash(
            &session,
            FlashKind::Info,
            format!(
                "If the email belongs to a member without a login, an activation link is on its way. \
                 It is valid for {} minutes.",
                state.config.token_ttl.whole_minutes()
            ),
        )
        .await?;
        Ok(Redirect::to("/login").into_response())
    }
    .await;

    back_on_error(&session, "/register", result).await
}

pub async fn activate(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        crate::auth::activate(&state, &token).await?;
        done(&session, "Your login is activated, welcome aboard! Log in below.", "/login").await
    }
    .await;

    back_on_error(&session, "/login", result).await
}

#[derive(Template)]
#[template(path = "auth/forgot-password.html")]
struct ForgotPasswordPage {
    page: PageContext,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ForgotPasswordForm {
    email: String,
    #[serde(rename = "cf-turnstile-response")]
    turnstile_response: Option<String>,
}

pub async fn forgot_password_page(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Html<String>> {
    render(ForgotPasswordPage {
        page: public_page(&state, &session).await?,
    })
}

pub async fn forgot_password(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ForgotPasswordForm>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        state
            .turnstile
            .verify(form.turnstile_response.as_deref(), client_ip(&headers))
            .await?;
        crate::auth::request_password_reset(&state, &form.email).await?;

        session::flash(
            &session,
            FlashKind::Info,
            "If the email belongs to a member with a login, a link to choose a new password is on its way.",
        )
        .await?;
        Ok(Redirect::to("/login").into_response())
    }
    .await;

    back_on_error(&session, "/forgot-password", result).await
}

#[derive(Template)]
#[template(path = "auth/reset-password.html")]
struct ResetPasswordPage {
    page: PageContext,
    token: String,
    min_password_length: usize,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ResetPasswordForm {
    password: String,
    password_confirmation: String,
}

pub async fn reset_password_page(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        crate::auth::check_reset_token(&state, &token).await?;
        let page = ResetPasswordPage {
            page: PageContext::load(&session, None).await?,
            token,
            min_password_length: crate::util::MIN_PASSWORD_LENGTH,
        };
        Ok(render(page)?.into_response())
    }
    .await;

    back_on_error(&session, "/forgot-password", result).await
}

pub async fn reset_password(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
    Form(form): Form<ResetPasswordForm>,
) -> AppResult<Response> {
    // A bad link sends the member off to ask for a new one, a bad password
    // back to the form.
    let back = match crate::auth::check_reset_token(&state, &token).await {
        Ok(()) => format!("/reset-password/{token}"),
        Err(_) => "/forgot-password".to_owned(),
    };

    let result: AppResult<Response> = async {
        crate::auth::reset_password(&state, &token, &form.password, &form.password_confirmation)
            .await?;
        done(&session, "Your password is changed, log in with it below.", "/login").await
    }
    .await;

    back_on_error(&session, &back, result).await
}
