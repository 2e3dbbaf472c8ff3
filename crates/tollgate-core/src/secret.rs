//! Comparison of shared secrets presented by callers.

use subtle::ConstantTimeEq;

/// Whether `presented` equals `expected`, compared in constant time.
///
/// Only the length may leak; an empty `expected` never matches.
pub fn secret_matches(expected: &str, presented: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}
