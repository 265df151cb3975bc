//! Conditional-response negotiation.
//!
//! Decides whether an export request can be answered with `304 Not Modified`
//! from the client's `If-None-Match` header and the server's current
//! freshness token. Pure: no store or cache access happens here.

use polyglot_storage::FreshnessToken;

/// Outcome of comparing a client validator with the server token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    /// The client already holds the current representation.
    NotModified,
    /// The body must be generated and sent.
    Generate,
}

/// Strip the weak prefix and surrounding quotes from one entity tag.
fn opaque_tag(raw: &str) -> &str {
    let raw = raw.trim();
    let raw = raw.strip_prefix("W/").unwrap_or(raw);
    raw.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw)
}

/// Compare an `If-None-Match` value against the stored token.
///
/// Accepts a single tag, a comma separated list, weak tags, and `*`. Without a
/// server token there is nothing to match, so the body is always generated.
pub fn negotiate(if_none_match: Option<&str>, current: Option<&FreshnessToken>) -> Negotiation {
    let (Some(header), Some(current)) = (if_none_match, current) else {
        return Negotiation::Generate;
    };

    let matched = header.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || (!candidate.is_empty() && opaque_tag(candidate) == current.as_str())
    });

    if matched {
        Negotiation::NotModified
    } else {
        Negotiation::Generate
    }
}
