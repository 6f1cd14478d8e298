// src/url.rs - Path joining rules shared by the client and fixtures

/// Join URL parts with single slashes.
///
/// A leading absolute part (`http...`) is kept as the base with its trailing
/// slash removed. Every other part loses one leading and one trailing slash and
/// is appended after a `/`. The result ends with `/` unless it carries a query
/// string.
pub fn join_url<S: AsRef<str>>(parts: &[S]) -> String {
    let mut url = String::new();
    let mut rest = parts;

    if let Some(first) = parts.first() {
        let first = first.as_ref();
        if first.starts_with("http") {
            url.push_str(first.strip_suffix('/').unwrap_or(first));
            rest = &parts[1..];
        }
    }

    for part in rest {
        let part = part.as_ref();
        let part = part.strip_prefix('/').unwrap_or(part);
        let part = part.strip_suffix('/').unwrap_or(part);
        url.push('/');
        url.push_str(part);
    }

    if !url.contains('?') {
        url.push('/');
    }
    url
}

/// Append `part` to `base` with exactly one slash between them
pub fn join_base(base: &str, part: &str) -> String {
    let part = part.strip_prefix('/').unwrap_or(part);
    if base.ends_with('/') {
        format!("{}{}", base, part)
    } else {
        format!("{}/{}", base, part)
    }
}

/// Add the `limit` query parameter, respecting an existing query string
pub fn with_limit(url: &str, limit: u32) -> String {
    if url.contains('?') {
        format!("{}&limit={}", url, limit)
    } else {
        format!("{}?limit={}", url, limit)
    }
}
