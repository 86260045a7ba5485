//! Countdown label parsing.

/// Parse an on-screen ad countdown into whole seconds.
///
/// Accepts either a bare seconds token (`"45"`) or `minutes:seconds`
/// (`"1:30"`). Surrounding whitespace is ignored. Anything else, including
/// an empty label, negative numbers and extra `:` groups, yields `0` so a
/// bad label never stops the correction loop.
pub fn parse_ad_time(text: &str) -> u64 {
    let mut parts = text.trim().split(':');
    let first = parts.next().and_then(parse_part);
    let second = parts.next().map(parse_part);

    if parts.next().is_some() {
        return 0;
    }

    match (first, second) {
        (Some(secs), None) => secs,
        (Some(mins), Some(Some(secs))) => mins.saturating_mul(60).saturating_add(secs),
        _ => 0,
    }
}

fn parse_part(part: &str) -> Option<u64> {
    let part = part.trim();
    if part.is_empty() {
        return None;
    }
    part.parse().ok()
}
