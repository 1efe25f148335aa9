use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};

use crate::cloud::{Candidate, RawImageRecord};

const ARM_MARKERS: &[&str] = &["arm", "aarch64"];

/// Requested CPU architecture.
///
/// `X64` is absence based: a record without any ARM marker counts as x64,
/// since not every catalog exposes an architecture field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchPolicy {
    Any,
    Arm64,
    #[default]
    X64,
}

impl ArchPolicy {
    pub fn allows(&self, architecture_text: &str) -> bool {
        let has_arm_marker = ARM_MARKERS.iter().any(|m| architecture_text.contains(m));
        match self {
            ArchPolicy::Any => true,
            ArchPolicy::Arm64 => has_arm_marker,
            ArchPolicy::X64 => !has_arm_marker,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchPolicy::Any => "any",
            ArchPolicy::Arm64 => "arm64",
            ArchPolicy::X64 => "x64",
        }
    }
}

impl fmt::Display for ArchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "any" | "auto" => Ok(ArchPolicy::Any),
            "arm64" | "aarch64" => Ok(ArchPolicy::Arm64),
            "x64" | "amd64" | "x86" | "x86_64" => Ok(ArchPolicy::X64),
            other => Err(format!(
                "unsupported architecture '{other}' (expected any, arm64 or x64)"
            )),
        }
    }
}

/// Substring rules evaluated against a record's offer name only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OfferRule {
    /// At least one must appear, when non-empty.
    pub required: &'static [&'static str],
    /// None may appear.
    pub excluded: &'static [&'static str],
}

impl OfferRule {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.excluded.is_empty()
    }

    pub fn allows(&self, offer: &str) -> bool {
        let offer = offer.to_ascii_lowercase();
        if self.excluded.iter().any(|t| offer.contains(t)) {
            return false;
        }
        self.required.is_empty() || self.required.iter().any(|t| offer.contains(t))
    }
}

/// Pattern plus architecture filter applied to a raw catalog listing.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    pattern: Regex,
    arch: ArchPolicy,
    offers: OfferRule,
}

impl CandidateFilter {
    /// `pattern` is compiled case-insensitively.
    pub fn new(pattern: &str, arch: ArchPolicy) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            pattern,
            arch,
            offers: OfferRule::default(),
        })
    }

    pub fn with_offer_rule(mut self, rule: OfferRule) -> Self {
        self.offers = rule;
        self
    }

    pub fn accepts(&self, record: &RawImageRecord) -> bool {
        if !self.pattern.is_match(record.searchable_text()) {
            return false;
        }
        if !self.offers.is_empty() && !self.offers.allows(record.offer().unwrap_or_default()) {
            return false;
        }
        self.arch.allows(&record.architecture_text())
    }

    pub fn apply(&self, records: Vec<RawImageRecord>) -> Vec<Candidate> {
        records
            .into_iter()
            .filter(|r| self.accepts(r))
            .map(Candidate::accepted)
            .collect()
    }
}
