//! EC2 AMI catalog, queried through `aws ec2 describe-images`.

use tracing::info;

use super::models::AwsDescribeImages;
use super::{
    CatalogClient, CatalogQuery, CommandRunner, ProviderKind, classify_failure, runner_failure,
};
use crate::cloud::RawImageRecord;
use crate::config::Env;
use crate::error::FinderError;
use crate::resolver::{ArchPolicy, NewestVersion, Ranker};

pub const AWS_BIN: &str = "aws";
pub const DEFAULT_OWNER: &str = "amazon";

const AUTH_MARKERS: &[&str] = &[
    "AuthFailure",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "UnrecognizedClientException",
];

/// Static AWS credentials handed to every `aws` invocation.
#[derive(Clone)]
pub struct AwsSession {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl std::fmt::Debug for AwsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSession")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl AwsSession {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    /// `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY` are required,
    /// `AWS_SESSION_TOKEN` is optional.
    pub fn from_env(env: &Env) -> Result<Self, FinderError> {
        let access_key_id = env
            .require("AWS_ACCESS_KEY_ID")
            .map_err(|e| FinderError::auth(ProviderKind::Aws, e.to_string()))?;
        let secret_access_key = env
            .require("AWS_SECRET_ACCESS_KEY")
            .map_err(|e| FinderError::auth(ProviderKind::Aws, e.to_string()))?;
        Ok(Self::new(
            access_key_id,
            secret_access_key,
            env.get("AWS_SESSION_TOKEN"),
        ))
    }

    fn envs(&self) -> Vec<(String, String)> {
        let mut envs = vec![
            ("AWS_ACCESS_KEY_ID".to_string(), self.access_key_id.clone()),
            (
                "AWS_SECRET_ACCESS_KEY".to_string(),
                self.secret_access_key.clone(),
            ),
            ("AWS_PAGER".to_string(), String::new()),
        ];
        if let Some(token) = &self.session_token {
            envs.push(("AWS_SESSION_TOKEN".to_string(), token.clone()));
        }
        envs
    }
}

pub struct AwsCatalog<R: CommandRunner> {
    session: AwsSession,
    runner: R,
    owner: String,
}

impl<R: CommandRunner> AwsCatalog<R> {
    pub fn new(session: AwsSession, runner: R, owner: impl Into<String>) -> Self {
        Self {
            session,
            runner,
            owner: owner.into(),
        }
    }

    fn describe_args(&self, query: &CatalogQuery<'_>) -> Vec<String> {
        let name = if query.pattern.is_empty() {
            "*".to_string()
        } else {
            format!("*{}*", query.pattern)
        };

        let mut args = vec![
            "ec2".to_string(),
            "describe-images".to_string(),
            "--region".to_string(),
            query.region.to_string(),
            "--owners".to_string(),
            self.owner.clone(),
            "--filters".to_string(),
            format!("Name=name,Values={name}"),
            "Name=state,Values=available".to_string(),
        ];
        if let Some(arch) = server_architecture(query.arch) {
            args.push(format!("Name=architecture,Values={arch}"));
        }
        args.extend(["--output".to_string(), "json".to_string()]);
        args
    }
}

fn server_architecture(arch: ArchPolicy) -> Option<&'static str> {
    match arch {
        ArchPolicy::Any => None,
        ArchPolicy::Arm64 => Some("arm64"),
        ArchPolicy::X64 => Some("x86_64"),
    }
}

#[async_trait::async_trait]
impl<R: CommandRunner> CatalogClient for AwsCatalog<R> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Aws
    }

    async fn list_images(
        &self,
        query: &CatalogQuery<'_>,
    ) -> Result<Vec<RawImageRecord>, FinderError> {
        info!(
            "Searching for AMI with pattern '*{}*' owned by '{}' in region '{}' zone '{}'",
            query.pattern, self.owner, query.region, query.zone
        );

        let output = self
            .runner
            .run(AWS_BIN, &self.describe_args(query), &self.session.envs())
            .await
            .map_err(|e| runner_failure(ProviderKind::Aws, e))?;
        if !output.is_success() {
            return Err(classify_failure(
                ProviderKind::Aws,
                AWS_BIN,
                &output,
                AUTH_MARKERS,
            ));
        }

        let listing: AwsDescribeImages = serde_json::from_str(&output.stdout).map_err(|e| {
            FinderError::catalog(
                ProviderKind::Aws,
                format!("unreadable describe-images output: {e}"),
            )
        })?;

        Ok(listing
            .images
            .into_iter()
            .map(|image| {
                RawImageRecord::new(
                    image.image_id,
                    image.name,
                    image.creation_date,
                    image.architecture,
                )
            })
            .collect())
    }

    fn ranker(&self) -> &dyn Ranker {
        &NewestVersion
    }

    /// EC2 name filters are wildcards, so the label is a literal substring.
    fn match_pattern(&self, mapped: &str) -> String {
        regex::escape(mapped)
    }
}
