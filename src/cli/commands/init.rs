use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use super::Command;
use crate::config::ProvisionerConfig;

/// Writes a starter configuration file with every setting at its default
pub struct InitConfigCommand {
    pub path: PathBuf,
    pub force: bool,
    pub webhook_url: Option<String>,
}

impl InitConfigCommand {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            force: false,
            webhook_url: None,
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_webhook_url(mut self, webhook_url: Option<String>) -> Self {
        self.webhook_url = webhook_url;
        self
    }

    pub fn write(&self) -> Result<&Path> {
        if self.path.exists() && !self.force {
            return Err(anyhow!(
                "{} already exists (use --force to overwrite)",
                self.path.display()
            ));
        }

        let mut config = ProvisionerConfig::default();
        if let Some(url) = &self.webhook_url {
            config.provisioning.webhook_url = url.clone();
        }
        config.save_to_file(&self.path)?;
        Ok(&self.path)
    }
}

impl Command for InitConfigCommand {
    async fn execute(&self) -> Result<()> {
        let path = self.write()?;
        println!("📝 Wrote {}", path.display());
        println!("   💡 Set the backend token with PROVISIONER_BACKEND__API_TOKEN or in the file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_defaults_with_webhook_url() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("provisioner.toml");

        InitConfigCommand::new(path.clone())
            .with_webhook_url(Some("https://hooks.example.com/in".to_string()))
            .write()
            .unwrap();

        let parsed: ProvisionerConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.provisioning.webhook_url, "https://hooks.example.com/in");
        assert_eq!(parsed.provisioning.progress_max_ticks, 200);
    }

    #[test]
    fn test_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("provisioner.toml");
        std::fs::write(&path, "# mine").unwrap();

        assert!(InitConfigCommand::new(path.clone()).write().is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine");

        InitConfigCommand::new(path.clone()).with_force(true).write().unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[backend]"));
    }
}
