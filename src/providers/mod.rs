pub mod aws;
pub mod azure;
pub mod gcp;
mod models;
pub mod runner;

use std::fmt;

use crate::cloud::{Candidate, Generation, RawImageRecord};
use crate::error::FinderError;
use crate::resolver::{ArchPolicy, OfferRule, Ranker};

pub use aws::{AwsCatalog, AwsSession};
pub use azure::{AzureCatalog, AzureSession};
pub use gcp::{GcpCatalog, GcpSession};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner, RunnerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Aws,
    Gcp,
    Azure,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Aws => "aws",
            ProviderKind::Gcp => "gcp",
            ProviderKind::Azure => "azure",
        }
    }

    /// Key used for the region in the output document.
    pub fn region_key(&self) -> &'static str {
        match self {
            ProviderKind::Gcp => "region",
            ProviderKind::Aws | ProviderKind::Azure => "Region",
        }
    }

    pub fn reports_generation(&self) -> bool {
        matches!(self, ProviderKind::Azure)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a catalog needs to list images for one zone.
#[derive(Debug, Clone, Copy)]
pub struct CatalogQuery<'a> {
    pub region: &'a str,
    pub zone: &'a str,
    /// Mapped label, exactly as the label mapper returned it.
    pub pattern: &'a str,
    pub arch: ArchPolicy,
}

/// One provider's image catalog.
///
/// `list_images` is a raw fan-out: it returns what the provider returned and
/// leaves filtering and ranking to the resolver. Any error it returns aborts
/// the whole run.
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn list_images(&self, query: &CatalogQuery<'_>)
    -> Result<Vec<RawImageRecord>, FinderError>;

    /// How the winner is picked from the filtered candidates.
    fn ranker(&self) -> &dyn Ranker;

    /// Regex source used to match a mapped label against record text.
    fn match_pattern(&self, mapped: &str) -> String {
        mapped.to_string()
    }

    /// Restrictions on the marketplace offer name, for catalogs that have one.
    fn offer_rule(&self) -> OfferRule {
        OfferRule::default()
    }

    /// Checked for every zone before any query is issued.
    fn check_zone(&self, _region: &str, _zone: &str) -> Result<(), FinderError> {
        Ok(())
    }

    fn generation(&self, _winner: &Candidate) -> Option<Generation> {
        None
    }
}

/// Turn a failed CLI run into the matching run-level error. Stderr is kept
/// verbatim so operators see exactly what the tool said.
pub(crate) fn classify_failure(
    provider: ProviderKind,
    program: &str,
    output: &CommandOutput,
    auth_markers: &[&str],
) -> FinderError {
    let stderr = output.stderr.trim();
    if auth_markers.iter().any(|marker| stderr.contains(marker)) {
        return FinderError::auth(provider, stderr);
    }
    let status = output
        .code
        .map_or_else(|| "signal".to_string(), |code| code.to_string());
    FinderError::catalog(
        provider,
        format!("{program} exited with status {status}: {stderr}"),
    )
}

/// Map runner failures (spawn, timeout) into run-level errors.
pub(crate) fn runner_failure(provider: ProviderKind, err: RunnerError) -> FinderError {
    match err {
        RunnerError::NotFound { program } => FinderError::ToolMissing { program },
        other => FinderError::catalog(provider, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandOutput, ProviderKind, RunnerError, classify_failure, runner_failure};
    use crate::error::FinderError;

    #[test]
    fn auth_markers_win_over_generic_failure() {
        let output = CommandOutput {
            code: Some(254),
            stdout: String::new(),
            stderr: "An error occurred (AuthFailure) when calling DescribeImages".into(),
        };
        let err = classify_failure(ProviderKind::Aws, "aws", &output, &["AuthFailure"]);
        assert_eq!(err.exit_code(), FinderError::EXIT_AUTH_FAILURE);
    }

    #[test]
    fn other_failures_are_catalog_errors_with_stderr() {
        let output = CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: "throttled\n".into(),
        };
        let err = classify_failure(ProviderKind::Gcp, "gcloud", &output, &["invalid_grant"]);
        assert_eq!(err.exit_code(), FinderError::EXIT_TOOL_FAILURE);
        assert_eq!(
            err.to_string(),
            "gcp catalog query failed: gcloud exited with status 1: throttled"
        );
    }

    #[test]
    fn missing_binary_is_its_own_error() {
        let err = runner_failure(
            ProviderKind::Azure,
            RunnerError::NotFound {
                program: "az".into(),
            },
        );
        assert_eq!(err.exit_code(), FinderError::EXIT_TOOL_MISSING);
    }
}
