//! `CanonPackageName` (§4.5): PyPI's distribution-name normalization.

/// `[A-Za-z0-9]` kept, `[A-Z]` lowercased, runs of `[-_.]` collapse to a
/// single `-`, other characters dropped.
pub fn canon_package_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    let mut started = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && started {
                out.push('-');
            }
            pending_dash = false;
            started = true;
            out.push(c.to_ascii_lowercase());
        } else if matches!(c, '-' | '_' | '.') {
            pending_dash = true;
        }
        // other characters are dropped entirely, including any run they sit in
    }
    out
}
