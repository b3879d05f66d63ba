use std::borrow::Cow;

/// Marker appended to text cut by [`truncate_chars`].
pub const ELLIPSIS: &str = "...";

/// Collapses every run of whitespace (including newlines from HTML
/// indentation) into a single space and trims both ends.
///
/// Text nodes scraped from the trending page are indented across several
/// lines; this turns them back into a single readable line.
pub fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Truncates `s` to at most `max_chars` characters, appending [`ELLIPSIS`]
/// when anything was cut.
///
/// Counts Unicode scalar values, not bytes, so multi-byte text is never split
/// mid-codepoint. Returns `Cow::Borrowed` when the input already fits.
///
/// ```
/// use trendpress::util::truncate_chars;
///
/// assert_eq!(truncate_chars("short", 10), "short");
/// assert_eq!(truncate_chars("Hello World", 5), "Hello...");
/// assert_eq!(truncate_chars("日本語テキスト", 3), "日本語...");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        None => Cow::Borrowed(s),
        Some((cut, _)) => Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS)),
    }
}
