/// Placeholder returned instead of any stored secret.
pub const MASK: &str = "********************";

/// Substring that identifies a masked value echoed back by a client.
pub const MASK_MARKER: &str = "****";

/// Mask an optional secret for display. Unset or empty secrets stay unset.
pub fn mask(secret: Option<&str>) -> Option<String> {
    match secret {
        Some(s) if !s.is_empty() => Some(MASK.to_string()),
        _ => None,
    }
}

/// Whether `value` is (or contains) the masking marker rather than real plaintext.
pub fn is_masked(value: &str) -> bool {
    value.contains(MASK_MARKER)
}
