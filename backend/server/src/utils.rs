use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

static NON_USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").unwrap());

/// Drops every character a username may not contain and caps the length.
pub fn sanitize_username(input: &str, max_chars: usize) -> String {
    NON_USERNAME
        .replace_all(input.trim(), "")
        .chars()
        .take(max_chars)
        .collect()
}

pub fn is_username_text(input: &str) -> bool {
    !NON_USERNAME.is_match(input)
}

/// Part of an address before the first `@`.
pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or_default()
}

pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
