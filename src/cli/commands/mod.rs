use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::api::{BackendClient, CommittedIntegration, IntegrationApi};
use crate::config::config;

pub mod add;
pub mod init;
pub mod list;
pub mod maintain;
pub mod output;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// Build the backend client from configuration and hand it to `f`
pub async fn with_backend<F, Fut, R>(f: F) -> Result<R>
where
    F: FnOnce(Arc<dyn IntegrationApi>) -> Fut,
    Fut: std::future::Future<Output = Result<R>>,
{
    let config = config()?;
    eprint!("🔄 Connecting to {}... ", config.backend.base_url);

    match BackendClient::new(&config.backend) {
        Ok(client) => {
            eprintln!("✅");
            f(Arc::new(client)).await
        }
        Err(e) => {
            eprintln!("❌");
            output::print_api_error(&e);
            Err(e.into())
        }
    }
}

/// Look up a committed integration by id
pub async fn find_integration(
    api: &dyn IntegrationApi,
    workspace: &str,
    integration: &str,
) -> Result<CommittedIntegration> {
    let integrations = api
        .list_integrations(workspace)
        .await
        .inspect_err(output::print_api_error)?;
    integrations
        .into_iter()
        .find(|i| i.id == integration)
        .ok_or_else(|| anyhow!("integration {integration} not found in workspace {workspace}"))
}

pub async fn show_how_to_start() -> Result<()> {
    println!("🔌 Integration provisioner");
    println!();
    println!("Add an integration:");
    println!("  provisioner add -w <workspace> -p linear -c apiKey=<key> --list-targets");
    println!("  provisioner add -w <workspace> -p linear -c apiKey=<key> -t <team> --commit");
    println!();
    println!("Manage committed integrations:");
    println!("  provisioner list -w <workspace>");
    println!("  provisioner test -w <workspace> -i <integration>");
    println!("  provisioner update-credentials -w <workspace> -i <integration> --secret <token>");
    println!("  provisioner delete -w <workspace> -i <integration>");
    println!();
    println!("Write a starter provisioner.toml:");
    println!("  provisioner init-config --webhook-url <public hook url>");
    Ok(())
}

