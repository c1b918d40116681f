//! Install trigger URLs.

use crate::config::InstallConfig;

/// Characters some URL parsers reject outright.
const PROBLEM_CHARS: &[char] = &[
    ' ', '<', '>', '#', '%', '{', '}', '|', '\\', '^', '~', '[', ']', '`',
];

/// Builds `<scheme>://?action=download-manifest&url=<percent-encoded url>`.
#[must_use]
pub fn install_trigger(config: &InstallConfig, manifest_url: &str) -> String {
    format!(
        "{}://?action=download-manifest&url={}",
        config.scheme,
        urlencoding::encode(manifest_url)
    )
}

/// Percent-encodes the problem characters in one pass.
///
/// A `%` that already starts a valid escape (`%` plus two hex digits) is
/// kept, so sanitizing an encoded URL does not encode it twice.
#[must_use]
pub fn sanitize(url: &str) -> String {
    let bytes = url.as_bytes();
    let mut out = String::with_capacity(url.len());
    for (i, c) in url.char_indices() {
        let escape_start = c == '%'
            && bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
            && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
        if PROBLEM_CHARS.contains(&c) && !escape_start {
            out.push_str(&format!("%{:02X}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}
