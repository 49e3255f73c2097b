//! Series index normalization.
//!
//! Raw indices come straight from the sidecar (`calibre:series_index`) and
//! may be blank, integral (`"3"`), or carry a fractional part (`"3.2"`).
//! The normalized token is used both as a folder-name prefix and as a title
//! prefix, so it has to sort lexicographically in series order.

/// Token used when the index is blank or unusable. Sorts after every
/// three-digit index.
pub const MISSING_INDEX: &str = "999";

const MIN_INTEGER_WIDTH: usize = 3;
const FRACTION_WIDTH: usize = 2;

/// Normalize a raw series index into a fixed-format sortable token.
///
/// The integer part loses any leading zeros, is zero-padded to at least
/// three digits and is never truncated. A fractional part, when present, is kept as a two-digit
/// sub-position: shorter parts are zero-padded on the left, longer ones are
/// cut after two digits. Anything that is not `digits[.digits]` falls back
/// to [`MISSING_INDEX`].
pub fn normalize(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return MISSING_INDEX.to_string();
    }

    let (integer, fraction) = match raw.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (raw, None),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(integer) || !fraction.is_none_or(all_digits) {
        tracing::debug!(index = raw, "Unusable series index, treating as missing");
        return MISSING_INDEX.to_string();
    }
    if integer.is_empty() && fraction.is_none_or(str::is_empty) {
        return MISSING_INDEX.to_string();
    }

    // Leading zeros would widen the token and break ordering.
    let integer = integer.trim_start_matches('0');
    let integer = if integer.is_empty() { "0" } else { integer };
    let mut token = format!("{integer:0>MIN_INTEGER_WIDTH$}");

    if let Some(fraction) = fraction {
        let cut = &fraction[..fraction.len().min(FRACTION_WIDTH)];
        token.push('.');
        token.push_str(&format!("{cut:0>FRACTION_WIDTH$}"));
    }

    token
}
