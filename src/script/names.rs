/// Prefix given to identifiers that would otherwise start with a digit.
pub const DIGIT_PREFIX: &str = "tbl_";

/// Turns an arbitrary display name into a valid M identifier.
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`. Distinct names can map to
/// the same identifier; the compilation context resolves those collisions.
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{}{}", DIGIT_PREFIX, sanitized)
    } else {
        sanitized
    }
}
