use anyhow::{anyhow, bail, Result};
use serde_json::json;
use std::sync::Arc;

use super::{output, with_backend, Command};
use crate::api::{IntegrationApi, ProviderKind};
use crate::config::config;
use crate::providers;
use crate::provisioning::{Credentials, ProvisioningSession, SessionOptions};
use crate::shutdown::ShutdownCoordinator;

pub struct AddCommand {
    pub workspace: String,
    pub provider: ProviderKind,
    pub credentials: Credentials,
    pub target: Option<String>,
    pub list_targets: bool,
    pub commit: bool,
    pub json: bool,
}

impl AddCommand {
    pub fn new(workspace: String, provider: ProviderKind, credentials: Credentials) -> Self {
        Self {
            workspace,
            provider,
            credentials,
            target: None,
            list_targets: false,
            commit: false,
            json: false,
        }
    }

    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    pub fn with_list_targets(mut self, list_targets: bool) -> Self {
        self.list_targets = list_targets;
        self
    }

    pub fn with_commit(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    fn open(&self, api: Arc<dyn IntegrationApi>) -> Result<ProvisioningSession> {
        let options = SessionOptions::from_config(&config()?.provisioning);
        let session = ProvisioningSession::open(
            api,
            providers::definition(self.provider),
            self.workspace.clone(),
            self.credentials.clone(),
            options,
        )
        .inspect_err(output::print_provision_error)?;
        Ok(session)
    }

    async fn print_targets(&self, session: &ProvisioningSession) -> Result<()> {
        let targets = session
            .discover_targets()
            .await
            .inspect_err(output::print_provision_error)?;
        if self.json {
            return output::print_json(&targets);
        }
        match session.provider().selection_label {
            None => println!("{} has nothing to select", self.provider),
            Some(_) if targets.is_empty() => println!("📋 No targets visible with these credentials"),
            Some(label) => {
                println!("📋 Available {label}s:");
                for target in targets {
                    println!("   • {target}");
                }
            }
        }
        Ok(())
    }

    pub async fn run(&self, api: Arc<dyn IntegrationApi>) -> Result<()> {
        let mut session = self.open(api)?;

        if self.list_targets {
            self.print_targets(&session).await?;
            session.close().await?;
            return Ok(());
        }

        match (&self.target, session.provider().selection_label) {
            (Some(target), _) => session.select_target(target.clone())?,
            (None, Some(label)) => bail!("--target is required: pick a {label} (see --list-targets)"),
            (None, None) => {}
        }

        let printer = if self.json {
            None
        } else {
            let mut events = session.subscribe();
            println!("🔌 Adding {} integration to workspace {}", self.provider, self.workspace);
            Some(tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    output::print_event(&event);
                }
            }))
        };
        let ctrl_c = ShutdownCoordinator::cancel_on_ctrl_c(session.cancellation_token());

        let outcome = session.test().await;
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                output::print_provision_error(&e);
                ctrl_c.abort();
                session.close().await?;
                return Err(e.into());
            }
        };

        let mut commit_error = None;
        let receipt = if outcome.is_completed() && self.commit {
            match session.commit().await {
                Ok(receipt) => Some(receipt),
                Err(e) => {
                    output::print_provision_error(&e);
                    commit_error = Some(e);
                    None
                }
            }
        } else {
            None
        };

        let snapshot = session.snapshot();
        let rollback = session.close().await?;
        ctrl_c.abort();
        if let Some(printer) = printer {
            // Drains the remaining events; the sender went away with the session
            let _ = printer.await;
        }

        if self.json {
            output::print_json(&json!({
                "outcome": outcome,
                "session": snapshot,
                "commit": receipt,
                "rollback": rollback,
            }))?;
        } else {
            output::print_outcome(&outcome);
            if let Some(report) = &rollback {
                output::print_rollback(report);
            }
            if outcome.is_completed() && !self.commit {
                println!("💡 Re-run with --commit to add the integration");
            }
        }

        if let Some(e) = commit_error {
            return Err(e.into());
        }
        if !outcome.is_completed() {
            return Err(anyhow!("{} setup did not complete", self.provider));
        }
        Ok(())
    }
}

impl Command for AddCommand {
    async fn execute(&self) -> Result<()> {
        with_backend(|api| self.run(api)).await
    }
}
