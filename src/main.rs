use anyhow::Result;
use clap::Parser;

use integration_provisioner::cli::commands::add::AddCommand;
use integration_provisioner::cli::commands::init::InitConfigCommand;
use integration_provisioner::cli::commands::list::ListCommand;
use integration_provisioner::cli::commands::maintain::{MaintainCommand, MaintenanceAction};
use integration_provisioner::cli::commands::{show_how_to_start, Command};
use integration_provisioner::cli::{Cli, Commands};
use integration_provisioner::{config, init_telemetry, ShutdownCoordinator};

fn main() -> Result<()> {
    let Cli { json, command } = Cli::parse();

    tokio::runtime::Runtime::new()?.block_on(async move {
        // A broken config file is reported by the command that needs it
        if let Ok(config) = config() {
            init_telemetry(&config.observability)?;
        }

        let result = match command {
            None => show_how_to_start().await,
            Some(Commands::Add {
                workspace,
                provider,
                credentials,
                target,
                list_targets,
                commit,
            }) => {
                AddCommand::new(workspace, provider, credentials.into_iter().collect())
                    .with_target(target)
                    .with_list_targets(list_targets)
                    .with_commit(commit)
                    .with_json(json)
                    .execute()
                    .await
            }
            Some(Commands::List { workspace }) => {
                ListCommand::new(workspace).with_json(json).execute().await
            }
            Some(Commands::Test { target }) => {
                MaintainCommand::new(target, MaintenanceAction::Test)
                    .with_json(json)
                    .execute()
                    .await
            }
            Some(Commands::UpdateCredentials { target, secret }) => {
                MaintainCommand::new(target, MaintenanceAction::UpdateCredentials { secret })
                    .with_json(json)
                    .execute()
                    .await
            }
            Some(Commands::Delete { target }) => {
                MaintainCommand::new(target, MaintenanceAction::Delete)
                    .with_json(json)
                    .execute()
                    .await
            }
            Some(Commands::InitConfig {
                path,
                webhook_url,
                force,
            }) => {
                InitConfigCommand::new(path)
                    .with_webhook_url(webhook_url)
                    .with_force(force)
                    .execute()
                    .await
            }
        };

        ShutdownCoordinator::shutdown_all_services();
        result
    })
}
