use anyhow::{anyhow, Result};
use std::sync::Arc;

use super::{find_integration, output, with_backend, Command};
use crate::api::IntegrationApi;
use crate::cli::IntegrationArgs;
use crate::config::config;
use crate::providers;
use crate::provisioning::{ChainOutcome, IntegrationMaintenance, SessionOptions};
use crate::shutdown::ShutdownCoordinator;

/// What to do with a committed integration
#[derive(Debug, Clone)]
pub enum MaintenanceAction {
    Test,
    UpdateCredentials { secret: String },
    Delete,
}

pub struct MaintainCommand {
    pub target: IntegrationArgs,
    pub action: MaintenanceAction,
    pub json: bool,
}

impl MaintainCommand {
    pub fn new(target: IntegrationArgs, action: MaintenanceAction) -> Self {
        Self {
            target,
            action,
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    async fn open(&self, api: Arc<dyn IntegrationApi>) -> Result<IntegrationMaintenance> {
        let integration =
            find_integration(api.as_ref(), &self.target.workspace, &self.target.integration)
                .await?;
        let provider = providers::definition(integration.provider);
        let options = SessionOptions::from_config(&config()?.provisioning);
        Ok(IntegrationMaintenance::new(api, provider, integration, options))
    }

    pub async fn run(&self, api: Arc<dyn IntegrationApi>) -> Result<()> {
        let mut maintenance = self.open(api).await?;
        let label = maintenance.integration().display_label();

        match &self.action {
            MaintenanceAction::Test => {
                let printer = (!self.json).then(|| {
                    let mut events = maintenance.subscribe();
                    println!("🧪 Testing {label}");
                    tokio::spawn(async move {
                        while let Some(event) = events.recv().await {
                            output::print_event(&event);
                        }
                    })
                });
                let ctrl_c = ShutdownCoordinator::cancel_on_ctrl_c(maintenance.cancellation_token());
                let report = maintenance.test().await;
                ctrl_c.abort();
                drop(maintenance);
                if let Some(printer) = printer {
                    let _ = printer.await;
                }

                let report = report.inspect_err(output::print_provision_error)?;
                if self.json {
                    output::print_json(&report)?;
                } else {
                    output::print_outcome(&report.outcome);
                    if let Some(rollback) = &report.rollback {
                        output::print_rollback(rollback);
                    }
                    for handle in &report.orphaned {
                        println!(
                            "   ⚠️  test {} {} is still on the provider",
                            handle.kind.describe(),
                            handle.id
                        );
                    }
                }
                match report.outcome {
                    ChainOutcome::Completed => Ok(()),
                    _ => Err(anyhow!("integration test failed for {label}")),
                }
            }
            MaintenanceAction::UpdateCredentials { secret } => {
                let response = maintenance
                    .update_credentials(secret)
                    .await
                    .inspect_err(output::print_provision_error)?;
                if self.json {
                    output::print_json(&response)?;
                } else {
                    println!("🔑 Credentials updated for {label}");
                }
                Ok(())
            }
            MaintenanceAction::Delete => {
                let report = maintenance
                    .delete()
                    .await
                    .inspect_err(output::print_provision_error)?;
                if self.json {
                    output::print_json(&report)?;
                } else {
                    output::print_teardown(&report);
                }
                if report.deleted {
                    Ok(())
                } else {
                    Err(anyhow!("{label} was not deleted"))
                }
            }
        }
    }
}

impl Command for MaintainCommand {
    async fn execute(&self) -> Result<()> {
        with_backend(|api| self.run(api)).await
    }
}
