use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};

use super::Generation;
use crate::error::FinderError;
use crate::providers::ProviderKind;

/// One `{nameLabel, zone}` pair from the input document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ZoneQuery {
    #[serde(rename = "nameLabel", default)]
    name_label: String,
    #[serde(default)]
    zone: String,
}

impl ZoneQuery {
    #[cfg(test)]
    pub fn new(name_label: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            name_label: name_label.into(),
            zone: zone.into(),
        }
    }

    pub fn name_label(&self) -> &str {
        self.name_label.trim()
    }

    pub fn zone(&self) -> &str {
        self.zone.trim()
    }
}

/// Input document: `{"Region": "...", "zones": [...]}`.
///
/// The region key is accepted in either casing and the GCP driver's older
/// `images` array is accepted in place of `zones`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolutionRequest {
    #[serde(alias = "Region", default)]
    region: Option<String>,
    #[serde(alias = "images", default)]
    zones: Vec<ZoneQuery>,
}

impl ResolutionRequest {
    #[cfg(test)]
    pub fn new(region: impl Into<String>, zones: Vec<ZoneQuery>) -> Self {
        Self {
            region: Some(region.into()),
            zones,
        }
    }

    /// Parse and validate an input document. A non-empty `region_override`
    /// replaces whatever region the document carries.
    pub fn from_json(json: &str, region_override: Option<&str>) -> Result<Self, FinderError> {
        let mut request: ResolutionRequest = serde_json::from_str(json)
            .map_err(|e| FinderError::Usage(format!("INPUT_JSON is not valid JSON: {e}")))?;

        if let Some(region) = region_override.map(str::trim).filter(|r| !r.is_empty()) {
            request.region = Some(region.to_string());
        }

        let has_region = request
            .region
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty());
        if !has_region {
            return Err(FinderError::Usage(
                "INPUT_JSON must include 'region' (or set REGION)".into(),
            ));
        }
        if request.zones.is_empty() {
            return Err(FinderError::Usage(
                "INPUT_JSON must include a non-empty 'zones' array".into(),
            ));
        }
        Ok(request)
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().map(str::trim).unwrap_or_default()
    }

    pub fn zones(&self) -> &[ZoneQuery] {
        &self.zones
    }
}

/// Outcome for one requested zone. `name` is `None` when nothing matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneResult {
    name_label: String,
    zone: String,
    name: Option<String>,
    generation: Option<Generation>,
}

impl ZoneResult {
    pub fn resolved(query: &ZoneQuery, name: Option<String>, generation: Option<Generation>) -> Self {
        Self {
            name_label: query.name_label().to_string(),
            zone: query.zone().to_string(),
            name,
            generation,
        }
    }

    pub fn unresolved(query: &ZoneQuery) -> Self {
        Self::resolved(query, None, None)
    }

    #[cfg(test)]
    pub fn name_label(&self) -> &str {
        &self.name_label
    }

    #[cfg(test)]
    pub fn zone(&self) -> &str {
        &self.zone
    }

    #[cfg(test)]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[cfg(test)]
    pub fn generation(&self) -> Option<Generation> {
        self.generation
    }
}

/// Region-scoped output document. Serialization follows the conventions of
/// the provider that produced it: the region key casing differs and only
/// Azure reports a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResponse {
    provider: ProviderKind,
    region: String,
    zones: Vec<ZoneResult>,
}

impl ResolutionResponse {
    pub fn new(provider: ProviderKind, region: impl Into<String>, zones: Vec<ZoneResult>) -> Self {
        Self {
            provider,
            region: region.into(),
            zones,
        }
    }

    #[cfg(test)]
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn zones(&self) -> &[ZoneResult] {
        &self.zones
    }

    pub fn all_unresolved(&self) -> bool {
        self.zones.iter().all(|z| z.name.is_none())
    }
}

struct ZoneEntry<'a> {
    result: &'a ZoneResult,
    with_generation: bool,
}

impl Serialize for ZoneEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.with_generation { 4 } else { 3 };
        let mut entry = serializer.serialize_struct("ZoneResult", len)?;
        entry.serialize_field("nameLabel", &self.result.name_label)?;
        entry.serialize_field("zone", &self.result.zone)?;
        entry.serialize_field("name", &self.result.name)?;
        if self.with_generation {
            entry.serialize_field("generation", &self.result.generation.map(|g| g.as_str()))?;
        }
        entry.end()
    }
}

impl Serialize for ResolutionResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let with_generation = self.provider.reports_generation();
        let entries: Vec<ZoneEntry<'_>> = self
            .zones
            .iter()
            .map(|result| ZoneEntry {
                result,
                with_generation,
            })
            .collect();

        let mut doc = serializer.serialize_map(Some(2))?;
        doc.serialize_entry(self.provider.region_key(), &self.region)?;
        doc.serialize_entry("zones", &entries)?;
        doc.end()
    }
}
