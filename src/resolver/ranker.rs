use crate::cloud::{Candidate, VersionKey};

/// Picks the single best candidate for a zone.
pub trait Ranker: Send + Sync {
    fn select_best(&self, candidates: Vec<Candidate>) -> Option<Candidate>;
}

/// Local ranking by [`VersionKey`], newest first. Equal keys keep the order
/// the provider returned them in, so the first one wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewestVersion;

impl Ranker for NewestVersion {
    fn select_best(&self, candidates: Vec<Candidate>) -> Option<Candidate> {
        let mut keyed: Vec<(VersionKey, Candidate)> = candidates
            .into_iter()
            .map(|c| (VersionKey::parse(c.record().version_token()), c))
            .collect();
        // sort_by is stable
        keyed.sort_by(|(a, _), (b, _)| b.cmp(a));
        keyed.into_iter().next().map(|(_, c)| c)
    }
}

/// The catalog already returned its results newest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogOrder;

impl Ranker for CatalogOrder {
    fn select_best(&self, candidates: Vec<Candidate>) -> Option<Candidate> {
        candidates.into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogOrder, NewestVersion, Ranker};
    use crate::cloud::{Candidate, RawImageRecord};

    fn candidate(id: &str, version: &str) -> Candidate {
        Candidate::accepted(RawImageRecord::new(id, id, version, ""))
    }

    fn winner(ranker: &dyn Ranker, candidates: Vec<Candidate>) -> Option<String> {
        ranker
            .select_best(candidates)
            .map(|c| c.record().identifier().to_string())
    }

    #[test]
    fn newest_version_uses_numeric_segments() {
        let picked = winner(
            &NewestVersion,
            vec![
                candidate("a", "1.2.9"),
                candidate("b", "1.2.10"),
                candidate("c", "1.2.2"),
            ],
        );
        assert_eq!(picked.as_deref(), Some("b"));
    }

    #[test]
    fn ties_keep_provider_order() {
        let picked = winner(
            &NewestVersion,
            vec![
                candidate("first", "24.04.202408010"),
                candidate("older", "22.04.202303010"),
                candidate("second", "24.04.202408010"),
            ],
        );
        assert_eq!(picked.as_deref(), Some("first"));
    }

    #[test]
    fn mixed_tokens_do_not_panic() {
        let picked = winner(
            &NewestVersion,
            vec![candidate("text", "24.04.latest"), candidate("num", "24.04.1")],
        );
        assert_eq!(picked.as_deref(), Some("num"));
    }

    #[test]
    fn empty_candidate_set_has_no_winner() {
        assert_eq!(winner(&NewestVersion, Vec::new()), None);
        assert_eq!(winner(&CatalogOrder, Vec::new()), None);
    }

    #[test]
    fn catalog_order_takes_first() {
        let picked = winner(
            &CatalogOrder,
            vec![candidate("new", "1"), candidate("newer", "2")],
        );
        assert_eq!(picked.as_deref(), Some("new"));
    }

    #[test]
    fn ranking_is_repeatable() {
        let make = || {
            vec![
                candidate("x", "2024.05.10"),
                candidate("y", "2024.06.01"),
                candidate("z", "2024.06.01"),
            ]
        };
        assert_eq!(winner(&NewestVersion, make()), winner(&NewestVersion, make()));
        assert_eq!(winner(&NewestVersion, make()).as_deref(), Some("y"));
    }
}
