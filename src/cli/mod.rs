use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::api::ProviderKind;

pub mod commands;

#[derive(Parser)]
#[command(name = "provisioner")]
#[command(about = "Provision issue-tracker and messaging integrations for a workspace")]
#[command(long_about = "Runs the verification chain for a provider integration (access check, label, \
                       webhook, test issue), commits it on success and rolls back anything it \
                       created otherwise. Start with 'provisioner add --help'.")]
pub struct Cli {
    /// Print machine-readable JSON instead of status lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
pub struct IntegrationArgs {
    /// Workspace owning the integration
    #[arg(long, short = 'w')]
    pub workspace: String,
    /// Id of the committed integration
    #[arg(long, short = 'i')]
    pub integration: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the setup chain for a provider and optionally commit the integration
    Add {
        /// Workspace to add the integration to
        #[arg(long, short = 'w')]
        workspace: String,
        /// Provider slug (jira, github, gitlab, asana, linear, trello, height, pagerduty, slack, msteams)
        #[arg(long, short = 'p', value_parser = parse_provider)]
        provider: ProviderKind,
        /// Credential field as NAME=VALUE; repeat for each field
        #[arg(long = "credential", short = 'c', value_parser = parse_key_val)]
        credentials: Vec<(String, String)>,
        /// Project, team, board or repository to integrate
        #[arg(long, short = 't')]
        target: Option<String>,
        /// Only list the targets visible with these credentials
        #[arg(long)]
        list_targets: bool,
        /// Commit when every step succeeded; without it the session is closed and rolled back
        #[arg(long)]
        commit: bool,
    },
    /// List integrations committed for a workspace
    List {
        #[arg(long, short = 'w')]
        workspace: String,
    },
    /// Re-run the access and test-issue checks of a committed integration
    Test {
        #[command(flatten)]
        target: IntegrationArgs,
    },
    /// Replace the stored secret of a committed integration
    UpdateCredentials {
        #[command(flatten)]
        target: IntegrationArgs,
        /// New API key or token
        #[arg(long)]
        secret: String,
    },
    /// Remove the provider webhook and label, then the integration record
    Delete {
        #[command(flatten)]
        target: IntegrationArgs,
    },
    /// Write a configuration file with default settings
    InitConfig {
        #[arg(long, default_value = "provisioner.toml")]
        path: PathBuf,
        /// Public URL providers should deliver webhook events to
        #[arg(long)]
        webhook_url: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn parse_provider(value: &str) -> Result<ProviderKind, String> {
    ProviderKind::ALL
        .into_iter()
        .find(|kind| kind.slug().eq_ignore_ascii_case(value))
        .ok_or_else(|| {
            let known: Vec<_> = ProviderKind::ALL.iter().map(|k| k.slug()).collect();
            format!("unknown provider `{value}` (expected one of: {})", known.join(", "))
        })
}

pub fn parse_key_val(value: &str) -> Result<(String, String), String> {
    let (key, val) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{value}`"))?;
    if key.trim().is_empty() {
        return Err(format!("missing credential name in `{value}`"));
    }
    Ok((key.trim().to_string(), val.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        assert_eq!(parse_provider("Linear"), Ok(ProviderKind::Linear));
        assert_eq!(parse_provider("msteams"), Ok(ProviderKind::Msteams));
        assert!(parse_provider("bugzilla").unwrap_err().contains("jira"));
    }

    #[test]
    fn test_parse_key_val_keeps_equals_in_value() {
        assert_eq!(
            parse_key_val("apiKey=abc=="),
            Ok(("apiKey".to_string(), "abc==".to_string()))
        );
        assert!(parse_key_val("apiKey").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_add_command_parses() {
        let cli = Cli::try_parse_from([
            "provisioner",
            "add",
            "-w",
            "ws1",
            "-p",
            "linear",
            "-c",
            "apiKey=k",
            "--target",
            "Support",
            "--commit",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Add {
                provider,
                credentials,
                commit,
                ..
            }) => {
                assert_eq!(provider, ProviderKind::Linear);
                assert_eq!(credentials, vec![("apiKey".to_string(), "k".to_string())]);
                assert!(commit);
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_init_config_defaults_path() {
        let cli = Cli::try_parse_from(["provisioner", "init-config"]).unwrap();
        match cli.command {
            Some(Commands::InitConfig { path, webhook_url, force }) => {
                assert_eq!(path, PathBuf::from("provisioner.toml"));
                assert!(webhook_url.is_none());
                assert!(!force);
            }
            _ => panic!("expected init-config"),
        }
    }
}
