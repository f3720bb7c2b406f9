//! Utility functions for Taro
//!
//! Common helper functions used across the codebase.

use std::sync::LazyLock;

use md5::{Digest, Md5};

/// Regex pattern for validating identifiers (dataId, group, etc.)
static VALID_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("^[a-zA-Z0-9_.:-]*$").expect("Invalid regex pattern"));

/// Validate a string contains only allowed characters
///
/// Allowed characters: alphanumeric, underscore, dot, colon, hyphen
///
/// # Examples
///
/// ```
/// use taro_common::is_valid;
///
/// assert!(is_valid("my-config.yaml"));
/// assert!(is_valid("app_name:v1"));
/// assert!(!is_valid("invalid/path"));
/// assert!(!is_valid("with spaces"));
/// ```
pub fn is_valid(str: &str) -> bool {
    VALID_PATTERN.is_match(str)
}

/// Compute the lowercase hex md5 fingerprint of config content
///
/// # Examples
///
/// ```
/// use taro_common::md5_hex;
///
/// assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
/// assert_eq!(md5_hex("a").len(), 32);
/// ```
pub fn md5_hex(content: &str) -> String {
    format!("{:x}", Md5::digest(content.as_bytes()))
}
