//! Abstract OS labels (`ubuntu-24.04`) to provider-specific search patterns.

use std::sync::OnceLock;

use regex::Regex;

use crate::providers::ProviderKind;

/// Ubuntu releases the mapper knows the codename of, keyed by `YY.MM`.
const UBUNTU_CODENAMES: &[(&str, &str)] = &[
    ("24.10", "oracular"),
    ("24.04", "noble"),
    ("23.10", "mantic"),
    ("23.04", "lunar"),
    ("22.10", "kinetic"),
    ("22.04", "jammy"),
    ("21.10", "impish"),
    ("21.04", "hirsute"),
    ("20.10", "groovy"),
    ("20.04", "focal"),
];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("invalid label format '{0}', expected 'ubuntu-YY.MM' or 'ubuntu-YY.MM-gpu'")]
    InvalidFormat(String),
    #[error("unknown Ubuntu version '{0}'")]
    UnknownVersion(String),
}

/// Maps an abstract label to the pattern a provider's catalog understands.
/// Implementations must be pure lookups.
pub trait LabelMapper: Send + Sync {
    fn map_label(&self, label: &str, provider: ProviderKind) -> Result<String, LabelError>;
}

fn label_regex() -> &'static Regex {
    static LABEL_RE: OnceLock<Regex> = OnceLock::new();
    LABEL_RE.get_or_init(|| {
        Regex::new(r"^ubuntu-(?P<version>\d{2}\.\d{2})(?:-gpu)?$")
            .expect("invalid ubuntu label regex")
    })
}

/// Label mapper for Ubuntu releases.
///
/// - AWS: `ubuntu-<codename>-<YY.MM>` (e.g. `ubuntu-jammy-22.04`)
/// - GCP: `ubuntu-<YYMM>` (e.g. `ubuntu-2404`)
/// - Azure: `<YY_MM>` (e.g. `24_04`)
#[derive(Debug, Clone, Copy, Default)]
pub struct UbuntuLabelMapper;

impl UbuntuLabelMapper {
    /// `YY.MM` part of a label; a trailing `-gpu` is accepted and ignored.
    fn parse_version(label: &str) -> Result<String, LabelError> {
        let normalised = label.trim().to_ascii_lowercase();
        label_regex()
            .captures(&normalised)
            .and_then(|caps| caps.name("version"))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| LabelError::InvalidFormat(label.to_string()))
    }

    fn codename(version: &str) -> Result<&'static str, LabelError> {
        UBUNTU_CODENAMES
            .iter()
            .find(|(v, _)| *v == version)
            .map(|(_, codename)| *codename)
            .ok_or_else(|| LabelError::UnknownVersion(version.to_string()))
    }
}

impl LabelMapper for UbuntuLabelMapper {
    fn map_label(&self, label: &str, provider: ProviderKind) -> Result<String, LabelError> {
        let version = Self::parse_version(label)?;
        let codename = Self::codename(&version)?;

        Ok(match provider {
            ProviderKind::Aws => format!("ubuntu-{codename}-{version}"),
            ProviderKind::Gcp => format!("ubuntu-{}", version.replace('.', "")),
            ProviderKind::Azure => version.replace('.', "_"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{LabelError, LabelMapper, UbuntuLabelMapper};
    use crate::providers::ProviderKind;
    use rstest::rstest;

    #[rstest]
    #[case("ubuntu-22.04", ProviderKind::Aws, "ubuntu-jammy-22.04")]
    #[case("ubuntu-24.04", ProviderKind::Gcp, "ubuntu-2404")]
    #[case("ubuntu-24.04", ProviderKind::Azure, "24_04")]
    #[case("ubuntu-24.04-gpu", ProviderKind::Aws, "ubuntu-noble-24.04")]
    #[case(" Ubuntu-20.04 ", ProviderKind::Azure, "20_04")]
    fn maps_known_labels(
        #[case] label: &str,
        #[case] provider: ProviderKind,
        #[case] expected: &str,
    ) {
        assert_eq!(
            UbuntuLabelMapper.map_label(label, provider).as_deref(),
            Ok(expected)
        );
    }

    #[test]
    fn rejects_foreign_labels() {
        assert_eq!(
            UbuntuLabelMapper.map_label("windows-11", ProviderKind::Aws),
            Err(LabelError::InvalidFormat("windows-11".into()))
        );
    }

    #[test]
    fn rejects_unknown_releases() {
        assert_eq!(
            UbuntuLabelMapper.map_label("ubuntu-18.04", ProviderKind::Gcp),
            Err(LabelError::UnknownVersion("18.04".into()))
        );
    }
}
