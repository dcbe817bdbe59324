//! URL pattern translation
//!
//! Users author loose patterns like `example.com` or `https://example.com/*`;
//! the matching engine wants its own filter syntax, where `|` anchors the
//! start of the URL and a bare string matches anywhere as a substring.

/// Translate a user-authored URL pattern into the engine's filter syntax.
///
/// Total by design: malformed input degrades to a permissive substring
/// match rather than erroring.
///
/// Rules:
/// 1. A pattern already containing `|` is raw filter syntax, pass through.
/// 2. A pattern with an explicit scheme gets its trailing wildcard and
///    trailing slash stripped and is start-anchored with `|`.
/// 3. Anything else (bare domain, domain/path) is an unanchored substring
///    match and passes through trimmed.
pub fn translate_pattern(pattern: &str) -> String {
    let pattern = pattern.trim();

    if pattern.contains('|') {
        return pattern.to_string();
    }

    if pattern.starts_with("http://") || pattern.starts_with("https://") {
        // At most one trailing wildcard, then at most one trailing slash
        let cleaned = pattern.strip_suffix('*').unwrap_or(pattern);
        let cleaned = cleaned.strip_suffix('/').unwrap_or(cleaned);
        return format!("|{}", cleaned);
    }

    pattern.to_string()
}
