use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::email::{mailer_from_config, Mailer};
use crate::turnstile::Turnstile;

/// Everything handlers share
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub mailer: Arc<dyn Mailer>,
    pub turnstile: Turnstile,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let mailer: Arc<dyn Mailer> = Arc::from(mailer_from_config(&config.mail));
        Self::with_mailer(pool, config, mailer)
    }

    pub fn with_mailer(pool: SqlitePool, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            pool,
            turnstile: Turnstile::new(&config.turnstile),
            config: Arc::new(config),
            mailer,
        }
    }

    /// Builds a link to a page of the site, for use in emails
    pub fn link(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}
