use anyhow::Result;
use std::sync::Arc;

use super::{output, with_backend, Command};
use crate::api::IntegrationApi;

pub struct ListCommand {
    pub workspace: String,
    pub json: bool,
}

impl ListCommand {
    pub fn new(workspace: String) -> Self {
        Self {
            workspace,
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub async fn run(&self, api: Arc<dyn IntegrationApi>) -> Result<()> {
        let integrations = api
            .list_integrations(&self.workspace)
            .await
            .inspect_err(output::print_api_error)?;

        if self.json {
            return output::print_json(&integrations);
        }
        if integrations.is_empty() {
            println!("📋 No integrations in workspace {}", self.workspace);
            println!("   💡 Add one with: provisioner add -w {} -p <provider> ...", self.workspace);
            return Ok(());
        }

        println!("📋 {} integration(s) in workspace {}:", integrations.len(), self.workspace);
        for integration in &integrations {
            let added = integration
                .inserted_at
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "   {:<10} {:<16} {}  (id {}, added {added})",
                integration.provider.slug(),
                integration.provider.display_name(),
                integration.display_label(),
                integration.id,
            );
        }
        Ok(())
    }
}

impl Command for ListCommand {
    async fn execute(&self) -> Result<()> {
        with_backend(|api| self.run(api)).await
    }
}
