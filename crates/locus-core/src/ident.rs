//! Reference parsing and id minting for locus
//!
//! Callers hand us loose issue references: a bare number, a numeric string,
//! or "PREFIX-number" in any case. Parsing normalizes them against a default
//! project prefix; nothing here errors, ambiguity is resolved downstream by
//! the locator.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A loose issue reference as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueRef {
    Text(String),
    Number(i64),
}

impl From<&str> for IssueRef {
    fn from(s: &str) -> Self {
        IssueRef::Text(s.to_string())
    }
}

impl From<String> for IssueRef {
    fn from(s: String) -> Self {
        IssueRef::Text(s)
    }
}

impl From<i64> for IssueRef {
    fn from(n: i64) -> Self {
        IssueRef::Number(n)
    }
}

impl std::fmt::Display for IssueRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueRef::Text(s) => write!(f, "{}", s),
            IssueRef::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Normalized form of an issue reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRef {
    /// Canonical "PREFIX-number" when the input was parseable, otherwise the
    /// raw string as given
    pub full_identifier: String,

    /// The numeric part when one was recognized; the authoritative fallback
    /// key for the locator
    pub number: Option<i64>,
}

impl ParsedRef {
    /// Prefix part of the identifier, when it has one.
    pub fn prefix(&self) -> Option<&str> {
        self.full_identifier
            .split_once('-')
            .map(|(prefix, _)| prefix)
    }
}

/// Parse a loose issue reference against the caller's default project prefix.
///
/// - "PREFIX-42" (any case) keeps its own prefix, uppercased — this is how
///   cross-project references enter the system
/// - a bare number or pure-digit string joins the default prefix
/// - anything else passes through untouched with no number
pub fn parse_issue_ref(value: &IssueRef, default_prefix: &str) -> ParsedRef {
    match value {
        IssueRef::Number(n) => ParsedRef {
            full_identifier: format!("{}-{}", default_prefix, n),
            number: Some(*n),
        },
        IssueRef::Text(s) => {
            if let Some((prefix, digits)) = split_prefixed(s) {
                return ParsedRef {
                    full_identifier: format!("{}-{}", prefix.to_uppercase(), digits),
                    number: digits.parse().ok(),
                };
            }
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(n) = s.parse::<i64>() {
                    return ParsedRef {
                        full_identifier: format!("{}-{}", default_prefix, n),
                        number: Some(n),
                    };
                }
            }
            ParsedRef {
                full_identifier: s.clone(),
                number: None,
            }
        }
    }
}

fn split_prefixed(s: &str) -> Option<(&str, &str)> {
    let (prefix, digits) = s.split_once('-')?;
    if prefix.is_empty() || digits.is_empty() {
        return None;
    }
    if prefix.bytes().all(|b| b.is_ascii_alphabetic())
        && digits.bytes().all(|b| b.is_ascii_digit())
    {
        Some((prefix, digits))
    } else {
        None
    }
}

/// Mint an opaque document id.
///
/// UUID + timestamp hash, encoded as crockford base32 lowercase. Collision
/// space is 80 bits; ids are store-global.
pub fn generate_doc_id() -> String {
    let uuid = Uuid::new_v4();
    let timestamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(uuid.as_bytes());
    hasher.update(timestamp.to_le_bytes());

    let hash = hasher.finalize();

    base32::encode(base32::Alphabet::Crockford, &hash[..10]).to_lowercase()
}
