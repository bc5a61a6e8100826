//! Everything the site keeps in a visitor's session: flash messages, the CSRF
//! token rendered into forms, and who is logged in.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::member::Member;
use crate::util::constant_time_eq;

const FLASH_KEY: &str = "flash";
const CSRF_KEY: &str = "csrf_token";
const MEMBER_KEY: &str = "member_id";
const RETURN_TO_KEY: &str = "return_to";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
            FlashKind::Info => "info",
        }
    }
}

/// A message shown once, on the next page the visitor sees
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

pub async fn flash(session: &Session, kind: FlashKind, message: impl Into<String>) -> AppResult<()> {
    let mut flashes: Vec<Flash> = session.get(FLASH_KEY).await?.unwrap_or_default();
    flashes.push(Flash {
        kind,
        message: message.into(),
    });
    session.insert(FLASH_KEY, flashes).await?;

    Ok(())
}

pub async fn take_flashes(session: &Session) -> AppResult<Vec<Flash>> {
    let flashes: Option<Vec<Flash>> = session.remove(FLASH_KEY).await?;
    Ok(flashes.unwrap_or_default())
}

/// The session's CSRF token, created on first use.
pub async fn csrf_token(session: &Session) -> AppResult<String> {
    if let Some(token) = session.get::<String>(CSRF_KEY).await? {
        return Ok(token);
    }

    let token = Uuid::new_v4().simple().to_string();
    session.insert(CSRF_KEY, &token).await?;
    Ok(token)
}

/// Whether `submitted` matches the session's CSRF token. A session without a
/// token never matches.
pub async fn csrf_matches(session: &Session, submitted: &str) -> AppResult<bool> {
    let expected: Option<String> = session.get(CSRF_KEY).await?;
    Ok(expected.is_some_and(|expected| constant_time_eq(expected.as_bytes(), submitted.as_bytes())))
}

pub async fn member_id(session: &Session) -> AppResult<Option<i64>> {
    Ok(session.get(MEMBER_KEY).await?)
}

/// Marks the member as logged in. The session id is cycled so that an id
/// planted before login is worthless afterwards.
pub async fn log_in(session: &Session, member: &Member) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(MEMBER_KEY, member.id).await?;
    Ok(())
}

pub async fn log_out(session: &Session) -> AppResult<()> {
    session.flush().await?;
    Ok(())
}

/// Remembers the page a visitor wanted before being sent to log in.
pub async fn set_return_to(session: &Session, path: &str) -> AppResult<()> {
    session.insert(RETURN_TO_KEY, path).await?;
    Ok(())
}

/// The page to go to after logging in. Only local paths are honoured.
pub async fn take_return_to(session: &Session) -> AppResult<String> {
    let path: Option<String> = session.remove(RETURN_TO_KEY).await?;
    Ok(path
        .filter(|path| path.starts_with('/') && !path.starts_with("//"))
        .unwrap_or_else(|| "/".to_owned()))
}

/// What the shared page layout needs: the navigation for the logged-in member,
/// pending flash messages and the CSRF token for forms.
#[derive(Clone, Debug, Default)]
pub struct PageContext {
    pub csrf_token: String,
    pub flashes: Vec<Flash>,
    pub member_name: Option<String>,
    pub is_admin: bool,
    pub turnstile_site_key: Option<String>,
}

impl PageContext {
    pub async fn load(session: &Session, member: Option<&Member>) -> AppResult<Self> {
        Ok(Self {
            csrf_token: csrf_token(session).await?,
            flashes: take_flashes(session).await?,
            member_name: member.map(Member::full_name),
            is_admin: member.is_some_and(|member| member.is_admin),
            turnstile_site_key: None,
        })
    }

    pub fn with_turnstile(mut self, site_key: Option<&str>) -> Self {
        self.turnstile_site_key = site_key.map(str::to_owned);
        self
    }

    pub fn logged_in(&self) -> bool {
        self.member_name.is_some()
    }
}
