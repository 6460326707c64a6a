//! Task identifier generation.

use chrono::Utc;

/// Upper bound (exclusive) of the random suffix.
const SUFFIX_RANGE: u32 = 1000;

/// Generates an identifier of the form `<unix-nanos>-<suffix>`.
///
/// Collisions are not checked against the registry; a collision surfaces as
/// a duplicate-ID rejection at insert time.
pub fn generate() -> String {
    // `None` only past the year 2262.
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let suffix = fastrand::u32(0..SUFFIX_RANGE);
    format!("{nanos}-{suffix}")
}
