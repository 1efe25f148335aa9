//! Compute Engine image catalog, queried through `gcloud compute images list`.
//!
//! Unlike the other catalogs, GCP filters and sorts server-side and returns
//! at most one image, so ranking is delegated to the service.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use super::models::GcpImage;
use super::{
    CatalogClient, CatalogQuery, CommandRunner, ProviderKind, classify_failure, runner_failure,
};
use crate::cloud::RawImageRecord;
use crate::config::Env;
use crate::error::FinderError;
use crate::resolver::{ArchPolicy, CatalogOrder, Ranker};

pub const GCLOUD_BIN: &str = "gcloud";
pub const DEFAULT_IMAGE_PROJECT: &str = "ubuntu-os-cloud";

const SELF_LINK_PREFIX: &str = "https://www.googleapis.com/compute/v1/";

const AUTH_MARKERS: &[&str] = &[
    "invalid_grant",
    "Reauthentication",
    "does not have permission",
    "UNAUTHENTICATED",
];

/// Service-account credentials for `gcloud`.
///
/// The key lives in a private temporary file for as long as the session does;
/// `gcloud` picks it up through its credential-file override rather than a
/// persistent `gcloud auth` login.
#[derive(Debug)]
pub struct GcpSession {
    project: String,
    key_file: NamedTempFile,
}

impl GcpSession {
    pub fn new(service_account_json: &str, project: impl Into<String>) -> Result<Self, FinderError> {
        let key: serde_json::Value = serde_json::from_str(service_account_json).map_err(|e| {
            FinderError::auth(
                ProviderKind::Gcp,
                format!("SERVICE_ACCOUNT_JSON is not valid JSON: {e}"),
            )
        })?;
        if !key.is_object() {
            return Err(FinderError::auth(
                ProviderKind::Gcp,
                "SERVICE_ACCOUNT_JSON must be a JSON object",
            ));
        }

        let activation_failed = |e: std::io::Error| {
            FinderError::auth(
                ProviderKind::Gcp,
                format!("service account activation failed: {e}"),
            )
        };
        let mut key_file = tempfile::Builder::new()
            .prefix("image-finder-sa-")
            .suffix(".json")
            .tempfile()
            .map_err(activation_failed)?;
        key_file
            .write_all(service_account_json.as_bytes())
            .and_then(|_| key_file.flush())
            .map_err(activation_failed)?;

        Ok(Self {
            project: project.into(),
            key_file,
        })
    }

    /// `SERVICE_ACCOUNT_JSON` is checked before `GOOGLE_CLOUD_PROJECT`.
    pub fn from_env(env: &Env) -> Result<Self, FinderError> {
        let key = env.require("SERVICE_ACCOUNT_JSON").map_err(|_| {
            FinderError::auth(
                ProviderKind::Gcp,
                "no valid service account credentials provided",
            )
        })?;
        let project = env.require("GOOGLE_CLOUD_PROJECT").map_err(|_| {
            FinderError::not_configured(
                ProviderKind::Gcp,
                "no project is set, set GOOGLE_CLOUD_PROJECT",
            )
        })?;
        Self::new(&key, project)
    }

    pub fn key_path(&self) -> &Path {
        self.key_file.path()
    }

    fn envs(&self) -> Vec<(String, String)> {
        vec![
            (
                "CLOUDSDK_AUTH_CREDENTIAL_FILE_OVERRIDE".to_string(),
                self.key_path().display().to_string(),
            ),
            ("CLOUDSDK_CORE_PROJECT".to_string(), self.project.clone()),
            ("CLOUDSDK_CORE_DISABLE_PROMPTS".to_string(), "1".to_string()),
        ]
    }
}

pub struct GcpCatalog<R: CommandRunner> {
    session: GcpSession,
    runner: R,
    image_project: String,
}

impl<R: CommandRunner> GcpCatalog<R> {
    pub fn new(session: GcpSession, runner: R, image_project: impl Into<String>) -> Self {
        Self {
            session,
            runner,
            image_project: image_project.into(),
        }
    }

    fn list_args(&self, query: &CatalogQuery<'_>) -> Vec<String> {
        vec![
            "compute".to_string(),
            "images".to_string(),
            "list".to_string(),
            "--project".to_string(),
            self.image_project.clone(),
            "--filter".to_string(),
            filter_expression(query.pattern, query.arch),
            "--sort-by=~creationTimestamp".to_string(),
            "--limit=1".to_string(),
            "--format=json".to_string(),
        ]
    }
}

fn filter_expression(pattern: &str, arch: ArchPolicy) -> String {
    let mut clauses = vec!["status=READY".to_string()];
    match arch {
        ArchPolicy::Any => {}
        ArchPolicy::Arm64 => clauses.push("architecture=ARM64".to_string()),
        ArchPolicy::X64 => clauses.push("architecture=X86_64".to_string()),
    }
    clauses.push(format!("(name~'{pattern}' OR family~'{pattern}')"));
    clauses.join(" AND ")
}

fn trim_self_link(self_link: &str) -> &str {
    self_link.strip_prefix(SELF_LINK_PREFIX).unwrap_or(self_link)
}

#[async_trait::async_trait]
impl<R: CommandRunner> CatalogClient for GcpCatalog<R> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gcp
    }

    async fn list_images(
        &self,
        query: &CatalogQuery<'_>,
    ) -> Result<Vec<RawImageRecord>, FinderError> {
        let args = self.list_args(query);
        let output = self
            .runner
            .run(GCLOUD_BIN, &args, &self.session.envs())
            .await
            .map_err(|e| runner_failure(ProviderKind::Gcp, e))?;
        if !output.is_success() {
            return Err(classify_failure(
                ProviderKind::Gcp,
                GCLOUD_BIN,
                &output,
                AUTH_MARKERS,
            ));
        }

        let images: Vec<GcpImage> = serde_json::from_str(&output.stdout).map_err(|e| {
            FinderError::catalog(
                ProviderKind::Gcp,
                format!("unreadable images list output: {e}"),
            )
        })?;
        info!(
            "Searching with filter: {}, found {} images",
            filter_expression(query.pattern, query.arch),
            images.len()
        );

        Ok(images
            .into_iter()
            .map(|image| {
                let family = image.family.unwrap_or_default();
                info!(".. Checking image: {} (family: {family})", image.name);
                RawImageRecord::new(
                    trim_self_link(&image.self_link),
                    format!("{} {family}", image.name),
                    image.creation_timestamp,
                    image.architecture.unwrap_or_default(),
                )
            })
            .collect())
    }

    fn ranker(&self) -> &dyn Ranker {
        &CatalogOrder
    }

    /// Zones must be `<region>-<suffix>`.
    fn check_zone(&self, region: &str, zone: &str) -> Result<(), FinderError> {
        let in_region = zone
            .strip_prefix(region)
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|suffix| !suffix.is_empty());
        if in_region {
            Ok(())
        } else {
            Err(FinderError::ZoneNotInRegion {
                region: region.to_string(),
                zone: zone.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_IMAGE_PROJECT, GcpCatalog, GcpSession, filter_expression, trim_self_link};
    use crate::cloud::{ResolutionRequest, ZoneQuery};
    use crate::config::Env;
    use crate::error::FinderError;
    use crate::labels::UbuntuLabelMapper;
    use crate::providers::CatalogClient;
    use crate::resolver::{ArchPolicy, Resolver};
    use crate::test_support::ScriptedRunner;
    use rstest::rstest;
    use serde_json::json;

    const KEY: &str = r#"{"type":"service_account","project_id":"demo"}"#;

    fn session() -> GcpSession {
        GcpSession::new(KEY, "billing-project").expect("session")
    }

    #[test]
    fn filter_combines_status_arch_and_pattern() {
        assert_eq!(
            filter_expression("ubuntu-2404", ArchPolicy::X64),
            "status=READY AND architecture=X86_64 AND (name~'ubuntu-2404' OR family~'ubuntu-2404')"
        );
        assert_eq!(
            filter_expression("ubuntu-2404", ArchPolicy::Any),
            "status=READY AND (name~'ubuntu-2404' OR family~'ubuntu-2404')"
        );
    }

    #[test]
    fn self_link_prefix_is_removed() {
        assert_eq!(
            trim_self_link(
                "https://www.googleapis.com/compute/v1/projects/ubuntu-os-cloud/global/images/ubuntu-2404-noble-amd64-v20240801"
            ),
            "projects/ubuntu-os-cloud/global/images/ubuntu-2404-noble-amd64-v20240801"
        );
    }

    #[rstest]
    #[case("us-central1-a", true)]
    #[case("us-central1-f", true)]
    #[case("us-central1", false)]
    #[case("us-central1-", false)]
    #[case("europe-west1-b", false)]
    fn zone_must_belong_to_region(#[case] zone: &str, #[case] ok: bool) {
        let catalog = GcpCatalog::new(session(), ScriptedRunner::new(), DEFAULT_IMAGE_PROJECT);
        assert_eq!(catalog.check_zone("us-central1", zone).is_ok(), ok);
    }

    #[test]
    fn session_writes_key_file_and_requires_project() {
        let session = session();
        let written = std::fs::read_to_string(session.key_path()).expect("key file");
        assert_eq!(written, KEY);

        let env = Env::from_pairs(&[("SERVICE_ACCOUNT_JSON", KEY)]);
        let err = GcpSession::from_env(&env).expect_err("project missing");
        assert_eq!(err.exit_code(), FinderError::EXIT_NOT_CONFIGURED);

        let env = Env::from_pairs(&[("GOOGLE_CLOUD_PROJECT", "p")]);
        let err = GcpSession::from_env(&env).expect_err("key missing");
        assert_eq!(err.exit_code(), FinderError::EXIT_AUTH_FAILURE);

        let err = GcpSession::new("[1, 2]", "p").expect_err("not an object");
        assert_eq!(err.exit_code(), FinderError::EXIT_AUTH_FAILURE);
    }

    #[tokio::test]
    async fn resolves_catalog_ranked_image() {
        let runner = ScriptedRunner::new();
        runner.push_output(
            Some(0),
            json!([{
                "name": "ubuntu-2404-noble-amd64-v20240801",
                "family": "ubuntu-2404-lts-amd64",
                "selfLink": "https://www.googleapis.com/compute/v1/projects/ubuntu-os-cloud/global/images/ubuntu-2404-noble-amd64-v20240801",
                "creationTimestamp": "2024-08-01T10:00:00.000-07:00",
                "architecture": "X86_64"
            }])
            .to_string(),
            "",
        );
        let session = session();
        let key_path = session.key_path().display().to_string();
        let catalog = GcpCatalog::new(session, runner.clone(), DEFAULT_IMAGE_PROJECT);
        let resolver = Resolver::new(&catalog, &UbuntuLabelMapper, ArchPolicy::X64);

        let response = resolver
            .resolve(&ResolutionRequest::new(
                "us-central1",
                vec![ZoneQuery::new("ubuntu-24.04", "us-central1-a")],
            ))
            .await
            .expect("resolves");
        assert_eq!(
            serde_json::to_value(&response).expect("serialize"),
            json!({
                "region": "us-central1",
                "zones": [{
                    "nameLabel": "ubuntu-24.04",
                    "zone": "us-central1-a",
                    "name": "projects/ubuntu-os-cloud/global/images/ubuntu-2404-noble-amd64-v20240801"
                }]
            })
        );

        let call = &runner.invocations()[0];
        assert!(call.command_string().starts_with(
            "gcloud compute images list --project ubuntu-os-cloud --filter"
        ));
        assert!(call.args.contains(&"--limit=1".to_string()));
        assert_eq!(
            call.env("CLOUDSDK_AUTH_CREDENTIAL_FILE_OVERRIDE"),
            Some(key_path.as_str())
        );
        assert_eq!(call.env("CLOUDSDK_CORE_PROJECT"), Some("billing-project"));
    }

    #[tokio::test]
    async fn foreign_zone_aborts_before_any_query() {
        let runner = ScriptedRunner::new();
        let catalog = GcpCatalog::new(session(), runner.clone(), DEFAULT_IMAGE_PROJECT);
        let resolver = Resolver::new(&catalog, &UbuntuLabelMapper, ArchPolicy::X64);
        let err = resolver
            .resolve(&ResolutionRequest::new(
                "us-central1",
                vec![
                    ZoneQuery::new("ubuntu-24.04", "us-central1-a"),
                    ZoneQuery::new("ubuntu-24.04", "europe-west1-b"),
                ],
            ))
            .await
            .expect_err("zone outside region");
        assert_eq!(err.exit_code(), FinderError::EXIT_ZONE_NOT_IN_REGION);
        assert!(runner.invocations().is_empty());
    }
}
