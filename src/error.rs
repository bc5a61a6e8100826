//! Error handling for the site.
//!
//! Prefer adding a variant to [AppError] over squeezing a new failure into
//! `BadRequest` or `Internal`, so that it gets the right status code and a
//! message members can act on.

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::session::PageContext;

/// The error enum for all error handling across the site.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// \[404\] The page or record doesn't exist.
    #[error("resource not found")]
    NotFound,
    /// \[303 to `/login`\] The page requires a logged-in member.
    #[error("login required")]
    Unauthorized,
    /// \[403\] The member isn't allowed to do this.
    #[error("access forbidden")]
    Forbidden,
    /// \[403\] The form was submitted without the session's CSRF token.
    #[error("the form has expired, please reload the page and try again")]
    InvalidCsrf,
    /// \[400\] The submitted data was rejected; the message is shown to the member.
    #[error("{0}")]
    BadRequest(String),
    /// \[500\] An error occured while talking to the database.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// \[500\] The session store failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
    /// \[500\] A template failed to render.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
    /// \[500\] Anything else that went wrong on our side.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::InvalidCsrf => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_)
            | AppError::Session(_)
            | AppError::Template(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error is the member's to fix, and so can be shown to them
    /// as a flash message on the page they came from.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, AppError::NotFound | AppError::BadRequest(_))
    }

    /// The message shown to members. Server errors are not described.
    pub fn public_message(&self) -> String {
        if self.status().is_server_error() {
            "Something went wrong on our side. Please try again later.".to_owned()
        } else {
            self.to_string()
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> Self {
        AppError::Internal(anyhow::anyhow!("password hashing failed: {error}"))
    }
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPage {
    page: PageContext,
    status: u16,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Unauthorized = self {
            return Redirect::to("/login").into_response();
        }

        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let page = ErrorPage {
            page: PageContext::default(),
            status: status.as_u16(),
            message: self.public_message(),
        };
        match page.render() {
            Ok(body) => (status, Html(body)).into_response(),
            Err(error) => {
                tracing::error!(%error, "failed to render error page");
                (status, page.message).into_response()
            }
        }
    }
}
