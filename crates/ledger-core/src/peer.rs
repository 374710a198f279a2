use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A remote ledger endpoint, compared by its canonical address.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Peer(String);

impl Peer {
    /// Canonical form: trimmed, `http://` when no scheme is given, lowercase
    /// scheme and authority, no trailing slash. The path keeps its case.
    pub fn parse(address: &str) -> Result<Self, LedgerError> {
        let trimmed = address.trim();
        let (scheme, rest) = match trimmed.split_once("://") {
            Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
            None => ("http".to_string(), trimmed),
        };
        let rest = rest.trim_end_matches('/');
        let (authority, path) = match rest.find('/') {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };
        if scheme.is_empty() || authority.is_empty() {
            return Err(LedgerError::InvalidPeer(address.to_string()));
        }
        Ok(Self(format!(
            "{scheme}://{}{path}",
            authority.to_ascii_lowercase()
        )))
    }

    pub fn address(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalization_examples() {
        let cases = [
            ("http://127.0.0.1:8080", "http://127.0.0.1:8080"),
            ("  HTTP://Node-A:8080/ ", "http://node-a:8080"),
            ("node-b:9000", "http://node-b:9000"),
            ("https://Host/Node/", "https://host/Node"),
        ];
        for (input, expected) in cases {
            assert_eq!(Peer::parse(input).unwrap().address(), expected, "{input}");
        }
    }

    #[test]
    fn aliases_compare_equal() {
        assert_eq!(
            Peer::parse("Example.com:80/").unwrap(),
            Peer::parse("http://example.com:80").unwrap()
        );
    }

    #[test]
    fn blank_addresses_are_rejected() {
        for bad in ["", "   ", "/", "http://", "://x"] {
            assert!(Peer::parse(bad).is_err(), "{bad:?}");
        }
    }
}
