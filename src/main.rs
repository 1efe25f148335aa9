mod cloud;
mod config;
mod error;
mod helpers;
mod labels;
mod providers;
mod resolver;
#[cfg(test)]
mod test_support;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use cloud::{ResolutionRequest, ResolutionResponse};
use config::Env;
use error::FinderError;
use helpers::DEFAULT_TERMINATION_LOG;
use labels::UbuntuLabelMapper;
use providers::{
    AwsCatalog, AwsSession, AzureCatalog, AzureSession, GcpCatalog, GcpSession, ProcessRunner,
};
use resolver::{ArchPolicy, Resolver};

/// Resolve abstract OS labels to concrete VM images, one per requested zone.
#[derive(Debug, Parser)]
#[command(name = "image-finder", version)]
struct Cli {
    #[command(subcommand)]
    provider: ProviderCommand,

    /// Request document: {"Region": "...", "zones": [{"nameLabel": "...", "zone": "..."}]}
    #[arg(long, env = "INPUT_JSON", global = true, hide_env_values = true)]
    input: Option<String>,

    /// Overrides the region carried by the request document.
    #[arg(long, env = "REGION", global = true)]
    region: Option<String>,

    /// any | arm64 | x64
    #[arg(long, env = "IMAGE_ARCH", global = true, default_value = "x64")]
    arch: ArchPolicy,

    #[arg(long, env = "OUTPUT_PATH", global = true, default_value = DEFAULT_TERMINATION_LOG)]
    termination_log: PathBuf,

    /// Upper bound for each provider CLI call, in seconds.
    #[arg(long, env = "QUERY_TIMEOUT_SECS", global = true, default_value_t = 120)]
    query_timeout: u64,
}

#[derive(Debug, Subcommand)]
enum ProviderCommand {
    /// EC2 AMIs via `aws ec2 describe-images`
    Aws {
        /// Only images published by this owner are considered.
        #[arg(long, env = "AWS_IMAGE_OWNER", default_value = providers::aws::DEFAULT_OWNER)]
        owner: String,
    },
    /// Compute Engine images via `gcloud compute images list`
    Gcp {
        #[arg(long, env = "GCP_IMAGE_PROJECT", default_value = providers::gcp::DEFAULT_IMAGE_PROJECT)]
        image_project: String,
    },
    /// Marketplace images via `az vm image list`
    Azure {
        #[arg(long, env = "AZURE_IMAGE_PUBLISHER", default_value = providers::azure::DEFAULT_PUBLISHER)]
        publisher: String,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn resolve(cli: &Cli, request: &ResolutionRequest) -> Result<ResolutionResponse, FinderError> {
    let env = Env::from_process();
    let runner = ProcessRunner::new(Duration::from_secs(cli.query_timeout));
    let labels = UbuntuLabelMapper;

    match &cli.provider {
        ProviderCommand::Aws { owner } => {
            let session = AwsSession::from_env(&env)?;
            let catalog = AwsCatalog::new(session, runner, owner.as_str());
            Resolver::new(&catalog, &labels, cli.arch).resolve(request).await
        }
        ProviderCommand::Gcp { image_project } => {
            let session = GcpSession::from_env(&env)?;
            let catalog = GcpCatalog::new(session, runner, image_project.as_str());
            Resolver::new(&catalog, &labels, cli.arch).resolve(request).await
        }
        ProviderCommand::Azure { publisher } => {
            let session = AzureSession::from_env(&env)?;
            let catalog = AzureCatalog::connect(session, runner, publisher.as_str()).await?;
            Resolver::new(&catalog, &labels, cli.arch).resolve(request).await
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let input = cli
        .input
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FinderError::Usage("INPUT_JSON environment variable is required".into()))?;
    let request = ResolutionRequest::from_json(input, cli.region.as_deref())?;

    let response = resolve(&cli, &request).await?;
    publish(&response, &cli.termination_log)
}

/// Print and persist the document, then fail when no zone resolved.
fn publish(response: &ResolutionResponse, termination_log: &Path) -> Result<()> {
    helpers::emit(response, termination_log).context("render result document")?;

    if response.all_unresolved() {
        return Err(FinderError::NoImagesMatched {
            zones: response.zones().len(),
        }
        .into());
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            error!("{err:#}");
            err.downcast_ref::<FinderError>()
                .map_or(FinderError::EXIT_UNKNOWN, FinderError::exit_code)
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::{Cli, ProviderCommand, publish};
    use crate::cloud::{ResolutionResponse, ZoneQuery, ZoneResult};
    use crate::error::FinderError;
    use crate::providers::ProviderKind;
    use crate::resolver::ArchPolicy;
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_provider_and_global_options() {
        let cli = Cli::try_parse_from([
            "image-finder",
            "azure",
            "--arch",
            "arm64",
            "--input",
            "{}",
            "--termination-log",
            "/tmp/out",
        ])
        .expect("valid args");
        assert!(matches!(cli.provider, ProviderCommand::Azure { .. }));
        assert_eq!(cli.arch, ArchPolicy::Arm64);
        assert_eq!(cli.termination_log.to_str(), Some("/tmp/out"));
    }

    #[test]
    fn rejects_unknown_architecture() {
        assert!(Cli::try_parse_from(["image-finder", "aws", "--arch", "riscv64"]).is_err());
    }

    #[test]
    fn all_null_document_is_persisted_before_exit_four() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("termination-log");
        let query = ZoneQuery::new("windows-11", "us-west-2a");
        let response =
            ResolutionResponse::new(ProviderKind::Aws, "us-west-2", vec![ZoneResult::unresolved(&query)]);

        let err = publish(&response, &path).expect_err("nothing matched");
        let finder = err.downcast_ref::<FinderError>().expect("typed error");
        assert!(matches!(finder, FinderError::NoImagesMatched { zones: 1 }));
        assert_eq!(finder.exit_code(), FinderError::EXIT_NO_IMAGES_MATCHED);
        assert_eq!(
            std::fs::read_to_string(&path).expect("read"),
            "{\"Region\":\"us-west-2\",\"zones\":[{\"nameLabel\":\"windows-11\",\"zone\":\"us-west-2a\",\"name\":null}]}\n"
        );
    }

    #[test]
    fn partial_match_publishes_and_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("termination-log");
        let found = ZoneQuery::new("ubuntu-24.04", "us-west-2a");
        let missing = ZoneQuery::new("windows-11", "us-west-2b");
        let response = ResolutionResponse::new(
            ProviderKind::Aws,
            "us-west-2",
            vec![
                ZoneResult::resolved(&found, Some("ami-0123".into()), None),
                ZoneResult::unresolved(&missing),
            ],
        );

        publish(&response, &path).expect("one zone matched");
        assert!(std::fs::read_to_string(&path).expect("read").contains("\"ami-0123\""));
    }
}
