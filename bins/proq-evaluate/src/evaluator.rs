//! Output Comparator - Deciding Whether One Test Case Passed
//!
//! **Critical Properties:**
//! - Knows nothing about processes
//! - Knows nothing about build toolchains
//! - Pure function: (actual output, expected output) → bool
//!
//! **Normalization Rules:**
//! - Trim leading and trailing whitespace on both sides: YES
//! - Strip carriage returns from the actual output: YES
//! - Strip carriage returns from the expected output: NO (normalized when the
//!   problem file is loaded)
//! - Collapse internal whitespace: NO
//! - Case sensitivity: YES (exact match required)

/// Normalize a captured actual output for comparison
pub fn normalize_actual(output: &str) -> String {
    output.trim().replace('\r', "")
}

/// Compare an actual output against an expected output
pub fn matches(actual: &str, expected: &str) -> bool {
    normalize_actual(actual) == expected.trim()
}
