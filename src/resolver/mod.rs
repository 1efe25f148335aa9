//! Per-zone resolution: label → catalog → filter → rank → result.

mod filter;
mod ranker;

pub use filter::{ArchPolicy, CandidateFilter, OfferRule};
pub use ranker::{CatalogOrder, NewestVersion, Ranker};

use tracing::{error, info, warn};

use crate::cloud::{RankedSelection, ResolutionRequest, ResolutionResponse, ZoneQuery, ZoneResult};
use crate::error::FinderError;
use crate::labels::LabelMapper;
use crate::providers::{CatalogClient, CatalogQuery};

pub struct Resolver<'a> {
    catalog: &'a dyn CatalogClient,
    labels: &'a dyn LabelMapper,
    arch: ArchPolicy,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a dyn CatalogClient, labels: &'a dyn LabelMapper, arch: ArchPolicy) -> Self {
        Self {
            catalog,
            labels,
            arch,
        }
    }

    /// Resolve every zone in request order, one at a time.
    ///
    /// A zone without a match yields a `null` name and the run carries on; a
    /// catalog failure aborts the whole run. Whether an all-`null` response
    /// is a failure is left to the caller.
    pub async fn resolve(&self, request: &ResolutionRequest) -> Result<ResolutionResponse, FinderError> {
        let provider = self.catalog.kind();
        let region = request.region();
        info!("Using {provider} region: {region}");
        info!("Zones to search: {}", request.zones().len());

        for query in request.zones() {
            self.catalog.check_zone(region, query.zone())?;
        }

        let mut results = Vec::with_capacity(request.zones().len());
        for query in request.zones() {
            let result = match self.resolve_zone(region, query).await? {
                Some(selection) => {
                    let name = selection.identifier();
                    match &name {
                        Some(id) => info!(
                            "Found image '{id}' for region '{region}' zone '{}' (nameLabel='{}')",
                            query.zone(),
                            query.name_label()
                        ),
                        None => error!(
                            "Winning image for zone '{}' has no usable identifier",
                            query.zone()
                        ),
                    }
                    let generation = name.as_ref().and(selection.generation());
                    ZoneResult::resolved(query, name, generation)
                }
                None => ZoneResult::unresolved(query),
            };
            results.push(result);
        }

        Ok(ResolutionResponse::new(provider, region, results))
    }

    async fn resolve_zone(
        &self,
        region: &str,
        query: &ZoneQuery,
    ) -> Result<Option<RankedSelection>, FinderError> {
        let provider = self.catalog.kind();
        let mapped = match self.labels.map_label(query.name_label(), provider) {
            Ok(mapped) => mapped,
            Err(err) => {
                warn!("Cannot map label for zone '{}': {err}", query.zone());
                error!(
                    "No images matched for nameLabel '{}' in zone '{}'.",
                    query.name_label(),
                    query.zone()
                );
                return Ok(None);
            }
        };

        info!(
            "Searching for image pattern '{mapped}' in region '{region}' zone '{}' (nameLabel='{}')",
            query.zone(),
            query.name_label()
        );

        let records = self
            .catalog
            .list_images(&CatalogQuery {
                region,
                zone: query.zone(),
                pattern: &mapped,
                arch: self.arch,
            })
            .await?;
        let listed = records.len();

        let pattern = self.catalog.match_pattern(&mapped);
        let filter = CandidateFilter::new(&pattern, self.arch)
            .map_err(|e| FinderError::Internal(format!("invalid search pattern '{pattern}': {e}")))?
            .with_offer_rule(self.catalog.offer_rule());
        let candidates = filter.apply(records);
        info!(
            "{} of {listed} listed image(s) match '{pattern}' ({})",
            candidates.len(),
            self.arch
        );

        let Some(winner) = self.catalog.ranker().select_best(candidates) else {
            error!(
                "No images matched for pattern '{pattern}' in zone '{}'.",
                query.zone()
            );
            return Ok(None);
        };

        let generation = self.catalog.generation(&winner);
        Ok(Some(RankedSelection::new(winner, generation)))
    }
}
