//! Step kind tags.
//!
//! Kinds are compared case-insensitively; these constants are the canonical
//! upper-case spellings used for priority lists.

pub const CAMEL_CONNECTOR: &str = "CAMEL-CONNECTOR";
pub const KAMELET: &str = "KAMELET";
pub const KNATIVE: &str = "KNATIVE";
pub const EIP: &str = "EIP";

/// Canonical form used for kind indexing and comparisons
pub fn normalize(kind: &str) -> String {
    kind.trim().to_ascii_uppercase()
}

pub fn same_kind(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
