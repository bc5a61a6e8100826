//! The deploy flag: a file the webhook raises and the server's deploy cron job
//! looks for, pulls the new version and then removes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::current_time;

pub struct DeployFlag {
    pub path: PathBuf,
}

impl DeployFlag {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Raises the flag, noting when and why. Raising it twice before the cron
    /// job runs just updates the note.
    pub async fn raise(&self, reason: &str) -> Result<()> {
        let note = format!("{} {}\n", current_time().unix_timestamp(), reason);
        tokio::fs::write(&self.path, note)
            .await
            .with_context(|| format!("Error writing deploy flag {}", self.path.display()))
    }
}
