//! Ticket payload parser
//!
//! Turns raw decoded QR text into a ticket reference and person count.
//! Vendor payloads look like:
//!
//! ```text
//! Chester walking tour sold by VIC - 2 person(s) - reference #AB123
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

/// Every vendor payload starts with this (case-insensitive)
pub const VENDOR_PREFIX: &str = "Chester walking tour";

static PAYLOAD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^Chester walking tour sold by VIC\s*-\s*(\d+)\s*person\(s\)\s*-\s*reference\s*#(.+)$")
        .expect("payload pattern is a valid regex")
});

/// Validated ticket payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedTicket {
    /// Non-empty, whitespace-normalized reference
    pub reference: String,
    /// Positive person count
    pub person_count: u32,
}

/// Strip a leading byte-order mark, trim, and collapse whitespace runs to single spaces
pub fn normalize(raw: &str) -> String {
    let without_bom = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    without_bom.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse raw decoded text; `None` means unparseable
pub fn parse_payload(raw: &str) -> Option<ParsedTicket> {
    let normalized = normalize(raw);

    let has_prefix = normalized
        .get(..VENDOR_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(VENDOR_PREFIX));
    if !has_prefix {
        return None;
    }

    let captures = PAYLOAD_PATTERN.captures(&normalized)?;
    let person_count: u32 = captures.get(1)?.as_str().parse().ok()?;
    let reference = captures.get(2)?.as_str().trim();

    if reference.is_empty() || person_count == 0 {
        return None;
    }

    Some(ParsedTicket {
        reference: reference.to_string(),
        person_count,
    })
}
