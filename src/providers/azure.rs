//! Azure Marketplace image catalog, queried through `az vm image list`.
//!
//! The listing has no server-side filter for this query shape, so the whole
//! publisher catalog for the region comes back and everything else happens
//! locally.

use serde::Deserialize;
use tempfile::TempDir;
use tracing::{debug, info};

use super::models::AzureImage;
use super::{
    CatalogClient, CatalogQuery, CommandRunner, ProviderKind, classify_failure, runner_failure,
};
use crate::cloud::{Candidate, Generation, RawImageRecord};
use crate::config::Env;
use crate::error::FinderError;
use crate::resolver::{NewestVersion, OfferRule, Ranker};

pub const AZ_BIN: &str = "az";
pub const DEFAULT_PUBLISHER: &str = "Canonical";

const AUTH_MARKERS: &[&str] = &["AADSTS", "az login", "InvalidAuthenticationToken"];

/// Ubuntu offers only; Pro offers share version numbering with the free ones.
const UBUNTU_OFFERS: OfferRule = OfferRule {
    required: &["ubuntu"],
    excluded: &["pro"],
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzConfig {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    tenant_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    subscription_id: Option<String>,
}

fn field(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Service-principal credentials plus a private `az` config directory, so
/// the login never touches the user's own profile.
pub struct AzureSession {
    client_id: String,
    tenant_id: String,
    client_secret: String,
    subscription_id: String,
    config_dir: TempDir,
}

impl std::fmt::Debug for AzureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureSession")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .finish_non_exhaustive()
    }
}

impl AzureSession {
    /// Parse `AZ_CONFIG_JSON` (`{clientId, tenantId, clientSecret,
    /// subscriptionId}`).
    pub fn from_config_json(json: &str) -> Result<Self, FinderError> {
        let conf: AzConfig = serde_json::from_str(json)
            .map_err(|e| FinderError::Usage(format!("AZ_CONFIG_JSON is not valid JSON: {e}")))?;

        let (Some(client_id), Some(tenant_id), Some(client_secret)) = (
            field(conf.client_id),
            field(conf.tenant_id),
            field(conf.client_secret),
        ) else {
            return Err(FinderError::auth(
                ProviderKind::Azure,
                "need clientId, tenantId and clientSecret in AZ_CONFIG_JSON",
            ));
        };
        let subscription_id = field(conf.subscription_id).ok_or_else(|| {
            FinderError::not_configured(
                ProviderKind::Azure,
                "no active subscription, set subscriptionId in AZ_CONFIG_JSON",
            )
        })?;

        let config_dir = tempfile::Builder::new()
            .prefix("image-finder-az-")
            .tempdir()
            .map_err(|e| FinderError::Internal(format!("cannot create az config dir: {e}")))?;

        Ok(Self {
            client_id,
            tenant_id,
            client_secret,
            subscription_id,
            config_dir,
        })
    }

    pub fn from_env(env: &Env) -> Result<Self, FinderError> {
        let json = env.get("AZ_CONFIG_JSON").unwrap_or_else(|| "{}".to_string());
        Self::from_config_json(&json)
    }

    fn envs(&self) -> Vec<(String, String)> {
        vec![
            (
                "AZURE_CONFIG_DIR".to_string(),
                self.config_dir.path().display().to_string(),
            ),
            ("AZURE_CORE_ONLY_SHOW_ERRORS".to_string(), "true".to_string()),
            (
                "AZURE_CORE_COLLECT_TELEMETRY".to_string(),
                "false".to_string(),
            ),
        ]
    }

    fn login_args(&self) -> Vec<String> {
        vec![
            "login".to_string(),
            "--service-principal".to_string(),
            "--username".to_string(),
            self.client_id.clone(),
            "--password".to_string(),
            self.client_secret.clone(),
            "--tenant".to_string(),
            self.tenant_id.clone(),
            "--output".to_string(),
            "none".to_string(),
        ]
    }

    fn account_set_args(&self) -> Vec<String> {
        vec![
            "account".to_string(),
            "set".to_string(),
            "--subscription".to_string(),
            self.subscription_id.clone(),
        ]
    }
}

pub struct AzureCatalog<R: CommandRunner> {
    session: AzureSession,
    runner: R,
    publisher: String,
}

impl<R: CommandRunner> AzureCatalog<R> {
    /// Log the session in and select its subscription.
    pub async fn connect(
        session: AzureSession,
        runner: R,
        publisher: impl Into<String>,
    ) -> Result<Self, FinderError> {
        let envs = session.envs();

        let login = runner
            .run(AZ_BIN, &session.login_args(), &envs)
            .await
            .map_err(|e| runner_failure(ProviderKind::Azure, e))?;
        if !login.is_success() {
            return Err(FinderError::auth(
                ProviderKind::Azure,
                format!("service principal login failed: {}", login.stderr.trim()),
            ));
        }

        let account = runner
            .run(AZ_BIN, &session.account_set_args(), &envs)
            .await
            .map_err(|e| runner_failure(ProviderKind::Azure, e))?;
        if !account.is_success() {
            return Err(FinderError::not_configured(
                ProviderKind::Azure,
                format!(
                    "cannot select subscription {}: {}",
                    session.subscription_id,
                    account.stderr.trim()
                ),
            ));
        }
        debug!("az session ready for subscription {}", session.subscription_id);

        Ok(Self {
            session,
            runner,
            publisher: publisher.into(),
        })
    }

    fn list_args(&self, query: &CatalogQuery<'_>) -> Vec<String> {
        vec![
            "vm".to_string(),
            "image".to_string(),
            "list".to_string(),
            "--location".to_string(),
            query.region.to_string(),
            "--publisher".to_string(),
            self.publisher.clone(),
            "--all".to_string(),
            "--output".to_string(),
            "json".to_string(),
        ]
    }
}

#[async_trait::async_trait]
impl<R: CommandRunner> CatalogClient for AzureCatalog<R> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Azure
    }

    async fn list_images(
        &self,
        query: &CatalogQuery<'_>,
    ) -> Result<Vec<RawImageRecord>, FinderError> {
        let output = self
            .runner
            .run(AZ_BIN, &self.list_args(query), &self.session.envs())
            .await
            .map_err(|e| runner_failure(ProviderKind::Azure, e))?;
        if !output.is_success() {
            return Err(classify_failure(
                ProviderKind::Azure,
                AZ_BIN,
                &output,
                AUTH_MARKERS,
            ));
        }

        let images: Vec<AzureImage> = serde_json::from_str(&output.stdout).map_err(|e| {
            FinderError::catalog(
                ProviderKind::Azure,
                format!("unreadable vm image list output: {e}"),
            )
        })?;
        info!(
            "Listed {} {} image(s) in '{}'",
            images.len(),
            self.publisher,
            query.region
        );

        Ok(images
            .into_iter()
            .map(|image| {
                let text = format!("{} {} {}", image.urn, image.offer, image.sku);
                RawImageRecord::new(
                    image.urn,
                    text,
                    image.version,
                    image.architecture.unwrap_or_default(),
                )
                .with_sku(image.sku)
                .with_offer(image.offer)
            })
            .collect())
    }

    fn ranker(&self) -> &dyn Ranker {
        &NewestVersion
    }

    fn offer_rule(&self) -> OfferRule {
        UBUNTU_OFFERS
    }

    fn generation(&self, winner: &Candidate) -> Option<Generation> {
        Some(Generation::from_sku(winner.record().sku().unwrap_or_default()))
    }
}
