use std::fmt;

/// Hypervisor generation of an Azure image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    V1,
    V2,
}

impl Generation {
    /// Classify from a marketplace SKU: anything carrying `gen2` boots as V2.
    pub fn from_sku(sku: &str) -> Self {
        if sku.to_ascii_lowercase().contains("gen2") {
            Generation::V2
        } else {
            Generation::V1
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Generation::V1 => "V1",
            Generation::V2 => "V2",
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalised representation of one catalog entry, regardless of which
/// provider returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImageRecord {
    identifier: String,
    searchable_text: String,
    version_token: String,
    architecture_hint: String,
    sku: Option<String>,
    offer: Option<String>,
}

impl RawImageRecord {
    pub fn new(
        identifier: impl Into<String>,
        searchable_text: impl Into<String>,
        version_token: impl Into<String>,
        architecture_hint: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            searchable_text: searchable_text.into(),
            version_token: version_token.into(),
            architecture_hint: architecture_hint.into(),
            sku: None,
            offer: None,
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_offer(mut self, offer: impl Into<String>) -> Self {
        self.offer = Some(offer.into());
        self
    }

    /// AMI id, trimmed GCP selfLink or Azure URN.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Name/offer/sku/family fields joined for pattern matching.
    pub fn searchable_text(&self) -> &str {
        &self.searchable_text
    }

    /// Raw version string or creation timestamp.
    pub fn version_token(&self) -> &str {
        &self.version_token
    }

    pub fn architecture_hint(&self) -> &str {
        &self.architecture_hint
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    /// Marketplace offer; only Azure records carry one.
    pub fn offer(&self) -> Option<&str> {
        self.offer.as_deref()
    }

    /// Lowercased text the architecture policy is evaluated against.
    pub fn architecture_text(&self) -> String {
        format!("{} {}", self.searchable_text(), self.architecture_hint()).to_ascii_lowercase()
    }
}

/// A record that survived pattern and architecture filtering. Only the
/// candidate filter constructs these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate(RawImageRecord);

impl Candidate {
    pub(crate) fn accepted(record: RawImageRecord) -> Self {
        Candidate(record)
    }

    pub fn record(&self) -> &RawImageRecord {
        &self.0
    }
}

/// Winner for a zone plus anything derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedSelection {
    candidate: Candidate,
    generation: Option<Generation>,
}

impl RankedSelection {
    pub fn new(candidate: Candidate, generation: Option<Generation>) -> Self {
        Self {
            candidate,
            generation,
        }
    }

    pub fn generation(&self) -> Option<Generation> {
        self.generation
    }

    /// Identifier as it should appear in the output document. Blank and
    /// placeholder values (`none`, `null`) collapse to `None`.
    pub fn identifier(&self) -> Option<String> {
        let id = self.candidate.record().identifier().trim();
        if id.is_empty() || id.eq_ignore_ascii_case("none") || id.eq_ignore_ascii_case("null") {
            None
        } else {
            Some(id.to_string())
        }
    }
}
