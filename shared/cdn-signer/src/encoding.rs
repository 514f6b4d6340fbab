use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Encodes bytes with the CDN's URL-safe base64 variant.
///
/// Standard base64 with `+` mapped to `-`, `=` to `_` and `/` to `~`, which keeps values usable
/// in query strings and cookies without further escaping.
#[must_use]
pub fn cdn_base64(bytes: &[u8]) -> String {
    STANDARD
        .encode(bytes)
        .chars()
        .map(|c| match c {
            '+' => '-',
            '=' => '_',
            '/' => '~',
            other => other,
        })
        .collect()
}
