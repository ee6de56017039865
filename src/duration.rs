//! The compact duration format used by time-windowed checks.

use std::time::Duration;

/// The input did not match the `<hours>h<minutes>m` grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration {0:?}, expected something like \"5m\" or \"1h30m\"")]
pub struct DurationParseError(pub String);

/// Parse a compact duration like `"5m"`, `"2h"` or `"1h30m"`.
///
/// Both components are optional but hours must come before minutes. The empty
/// string is a valid zero-length duration; existing check invocations rely on
/// that, so it is deliberate and pinned by a test. There are no seconds, days
/// or fractional components.
pub fn parse_duration(text: &str) -> Result<Duration, DurationParseError> {
    let (hours, rest) = component(text, 'h').ok_or_else(|| DurationParseError(text.to_owned()))?;
    let (minutes, rest) = component(rest, 'm').ok_or_else(|| DurationParseError(text.to_owned()))?;

    if !rest.is_empty() {
        return Err(DurationParseError(text.to_owned()));
    }

    hours
        .unwrap_or(0)
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes.unwrap_or(0).checked_mul(60)?))
        .map(Duration::from_secs)
        .ok_or_else(|| DurationParseError(text.to_owned()))
}

/// Split one `<digits><suffix>` component off the front of `s`.
///
/// Returns `None` only when the digits overflow a u64; a missing component is
/// `(None, s)` so the caller can try the next suffix on the same input.
fn component(s: &str, suffix: char) -> Option<(Option<u64>, &str)> {
    let digits = s.len() - s.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return Some((None, s));
    }
    match s[digits..].strip_prefix(suffix) {
        Some(rest) => {
            let value = s[..digits].parse().ok()?;
            Some((Some(value), rest))
        }
        None => Some((None, s)),
    }
}
