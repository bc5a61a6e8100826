//! Runtime configuration, read from the environment.
//!
//! A `.env` file in the working directory is loaded first, so development
//! setups can keep their settings there instead of exporting them.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    /// Where to find the SQLite database, e.g. `sqlite://seglarklubb.db`
    pub database_url: String,
    /// The address the HTTP server listens on
    pub bind_address: String,
    /// The public URL of the site, used to build links in emails
    pub base_url: String,
    pub mail: MailConfig,
    pub turnstile: TurnstileConfig,
    /// How long registration and password reset tokens stay valid
    pub token_ttl: Duration,
    /// The bcrypt cost used when hashing new passwords
    pub password_cost: u32,
    /// Whether the session cookie is only sent over HTTPS
    pub cookie_secure: bool,
    /// Key required by the deploy webhook; the webhook is disabled without one
    pub deploy_key: Option<String>,
    /// The file the deploy webhook touches for the cron job to pick up
    pub deploy_flag_path: PathBuf,
    pub log_level: String,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    /// Mailgun API key; without one, emails are only written to the log
    pub mailgun_token: Option<String>,
    pub mailgun_domain: String,
    pub from_name: String,
    pub from_address: String,
}

#[derive(Clone, Debug, Default)]
pub struct TurnstileConfig {
    pub site_key: Option<String>,
    /// Without a secret, Turnstile verification is skipped
    pub secret: Option<String>,
}

impl Config {
    pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 15;

    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let token_ttl = token_ttl(
            parse_var("TOKEN_TTL_MINUTES")?.unwrap_or(Self::DEFAULT_TOKEN_TTL_MINUTES),
        )?;

        Ok(Self {
            database_url: var_or("DATABASE_URL", "sqlite://seglarklubb.db"),
            bind_address: var_or("BIND_ADDRESS", "0.0.0.0:3000"),
            base_url: var_or("BASE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_owned(),
            mail: MailConfig {
                mailgun_token: var_opt("MAILGUN_TOKEN"),
                mailgun_domain: var_or("MAILGUN_DOMAIN", "mg.example.org"),
                from_name: var_or("MAIL_FROM_NAME", "Seglarklubben"),
                from_address: var_or("MAIL_FROM_ADDRESS", "noreply@example.org"),
            },
            turnstile: TurnstileConfig {
                site_key: var_opt("TURNSTILE_SITE_KEY"),
                secret: var_opt("TURNSTILE_SECRET"),
            },
            token_ttl,
            password_cost: parse_var("PASSWORD_COST")?.unwrap_or(bcrypt::DEFAULT_COST),
            cookie_secure: parse_var("COOKIE_SECURE")?.unwrap_or(true),
            deploy_key: var_opt("DEPLOY_KEY"),
            deploy_flag_path: PathBuf::from(var_or("DEPLOY_FLAG_PATH", "deploy.flag")),
            log_level: var_or("LOG_LEVEL", "info"),
        })
    }

    /// A configuration suitable for tests: in-memory database, no external services.
    pub fn for_testing() -> Self {
        Self {
            database_url: "sqlite::memory:".to_owned(),
            bind_address: "127.0.0.1:0".to_owned(),
            base_url: "http://localhost".to_owned(),
            mail: MailConfig {
                mailgun_token: None,
                mailgun_domain: "mg.example.org".to_owned(),
                from_name: "Seglarklubben".to_owned(),
                from_address: "noreply@example.org".to_owned(),
            },
            turnstile: TurnstileConfig::default(),
            token_ttl: Duration::minutes(Self::DEFAULT_TOKEN_TTL_MINUTES),
            password_cost: 4,
            cookie_secure: false,
            deploy_key: None,
            deploy_flag_path: std::env::temp_dir().join("seglarklubb-deploy.flag"),
            log_level: "debug".to_owned(),
        }
    }
}

fn token_ttl(minutes: i64) -> Result<Duration> {
    if minutes <= 0 {
        anyhow::bail!("`TOKEN_TTL_MINUTES` must be positive, got {minutes}");
    }

    Ok(Duration::minutes(minutes))
}

fn var_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn var_or(name: &str, default: &str) -> String {
    var_opt(name).unwrap_or_else(|| default.to_owned())
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var_opt(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .with_context(|| format!("`{name}` has an invalid value: {value}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    // every test sets variables of its own, as tests share the environment

    #[test]
    fn unset_and_blank_variables_are_none() {
        std::env::set_var("SEGLARKLUBB_TEST_BLANK", "  ");
        assert_eq!(parse_var::<u32>("SEGLARKLUBB_TEST_UNSET").unwrap(), None);
        assert_eq!(parse_var::<u32>("SEGLARKLUBB_TEST_BLANK").unwrap(), None);
    }

    #[test]
    fn values_are_parsed_into_their_types() {
        std::env::set_var("SEGLARKLUBB_TEST_COST", " 10 ");
        std::env::set_var("SEGLARKLUBB_TEST_SECURE", "false");
        assert_eq!(parse_var::<u32>("SEGLARKLUBB_TEST_COST").unwrap(), Some(10));
        assert_eq!(parse_var::<bool>("SEGLARKLUBB_TEST_SECURE").unwrap(), Some(false));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        std::env::set_var("SEGLARKLUBB_TEST_TTL", "fifteen");
        std::env::set_var("SEGLARKLUBB_TEST_FLAG", "ja");

        let error = parse_var::<i64>("SEGLARKLUBB_TEST_TTL").unwrap_err();
        assert!(error.to_string().contains("`SEGLARKLUBB_TEST_TTL` has an invalid value: fifteen"));
        let error = parse_var::<bool>("SEGLARKLUBB_TEST_FLAG").unwrap_err();
        assert!(error.to_string().contains("SEGLARKLUBB_TEST_FLAG"));
    }

    #[test]
    fn token_lifetimes_must_be_positive() {
        assert_eq!(token_ttl(15).unwrap(), Duration::minutes(15));
        assert!(token_ttl(0).unwrap_err().to_string().contains("must be positive"));
        assert!(token_ttl(-5).is_err());
    }
}
