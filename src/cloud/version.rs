use std::cmp::Ordering;

/// One dot-separated segment of a version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionToken {
    Numeric(u64),
    Text(String),
}

impl Ord for VersionToken {
    // Numeric segments outrank text segments at the same position.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (VersionToken::Numeric(a), VersionToken::Numeric(b)) => a.cmp(b),
            (VersionToken::Text(a), VersionToken::Text(b)) => a.cmp(b),
            (VersionToken::Numeric(_), VersionToken::Text(_)) => Ordering::Greater,
            (VersionToken::Text(_), VersionToken::Numeric(_)) => Ordering::Less,
        }
    }
}

impl PartialOrd for VersionToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Typed sort key derived from a version string or timestamp.
///
/// Keys compare segment by segment; when one key is a prefix of the other the
/// shorter one is older. `"1.2.10"` therefore sorts above `"1.2.9"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionKey(Vec<VersionToken>);

impl VersionKey {
    pub fn parse(raw: &str) -> Self {
        let tokens = raw
            .split('.')
            .map(|segment| match segment.parse::<u64>() {
                Ok(n) => VersionToken::Numeric(n),
                Err(_) => VersionToken::Text(segment.to_string()),
            })
            .collect();
        VersionKey(tokens)
    }

    #[cfg(test)]
    pub fn tokens(&self) -> &[VersionToken] {
        &self.0
    }
}
