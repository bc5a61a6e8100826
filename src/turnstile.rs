//! Cloudflare Turnstile verification for the login and sign-up forms.

use anyhow::Context;
use serde::Deserialize;

use crate::config::TurnstileConfig;
use crate::error::{AppError, AppResult};

const SITEVERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

#[derive(Deserialize)]
struct SiteverifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

#[derive(Clone)]
pub struct Turnstile {
    secret: Option<String>,
    site_key: Option<String>,
    client: reqwest::Client,
}

impl Turnstile {
    pub fn new(config: &TurnstileConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            site_key: config.site_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// The public key for the widget, if verification is switched on
    pub fn site_key(&self) -> Option<&str> {
        self.secret.as_ref().and(self.site_key.as_deref())
    }

    /// Checks the widget's response with Cloudflare. Passes everything when no
    /// secret is configured.
    pub async fn verify(&self, response: Option<&str>, remote_ip: Option<&str>) -> AppResult<()> {
        let Some(secret) = &self.secret else {
            return Ok(());
        };
        let response = response
            .filter(|response| !response.is_empty())
            .ok_or_else(|| AppError::bad_request("Please complete the bot check"))?;

        let mut form = vec![("secret", secret.as_str()), ("response", response)];
        if let Some(remote_ip) = remote_ip {
            form.push(("remoteip", remote_ip));
        }

        let result: SiteverifyResponse = self
            .client
            .post(SITEVERIFY_URL)
            .form(&form)
            .send()
            .await
            .context("Failed to reach Turnstile")?
            .error_for_status()
            .context("Turnstile rejected the verification request")?
            .json()
            .await
            .context("Turnstile sent an unreadable response")?;

        if result.success {
            Ok(())
        } else {
            tracing::info!(errors = ?result.error_codes, "Turnstile check failed");
            Err(AppError::bad_request("The bot check failed, please try again"))
        }
    }
}
