//! Cookie string parsing.
//!
//! The CSRF-cookie handshake needs to read the anti-forgery token the server
//! sets in a script-visible cookie and echo it back in a header. The lookup
//! works on the same `name=value; name2=value2` string a browser exposes as
//! `document.cookie`, so it behaves identically against a cookie-session
//! server whether the jar belongs to a browser or to our HTTP agent.

use percent_encoding::percent_decode_str;

/// Default cookie name used by cookie-session servers for the CSRF token.
pub const DEFAULT_CSRF_COOKIE: &str = "XSRF-TOKEN";

/// Find `name` in a cookie string and return its URL-decoded value.
///
/// Entries are split on `;`, trimmed, then split on the first `=`. A missing
/// cookie is not an error. Values that do not decode to valid UTF-8 are
/// returned as-is.
pub fn extract_cookie(cookie_string: &str, name: &str) -> Option<String> {
    cookie_string
        .split(';')
        .map(str::trim)
        .filter_map(|entry| entry.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| decode_value(value))
}

fn decode_value(raw: &str) -> String {
    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Render `(name, value)` pairs the way `document.cookie` does.
pub fn render_cookie_string<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}
