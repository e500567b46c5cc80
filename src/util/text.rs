use std::borrow::Cow;

/// Strips markup tags from feed-supplied text.
///
/// Feed titles and summaries routinely arrive wrapped in HTML (`<p>`,
/// `<b>`, CDATA-escaped fragments). This removes everything between `<`
/// and the next `>`, replacing each tag with a single space so that
/// `Hello<br>World` does not fuse into one word. A `<` with no closing
/// `>` drops the remainder of the string — truncated markup is treated
/// as markup, not content.
///
/// Returns `Cow::Borrowed` when the input contains no `<` (common case).
pub fn strip_markup(s: &str) -> Cow<'_, str> {
    if !s.contains('<') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        out.push(' ');
        match rest[open..].find('>') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Collapses all runs of whitespace (including newlines) into single
/// spaces and trims the ends. Used to make fingerprint input insensitive
/// to the whitespace drift publishers introduce when re-rendering markup.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes one textual feed field: strip markup, decode HTML/XML
/// entities, trim surrounding whitespace.
///
/// An empty result is reported as `None`, not as an empty string — an
/// item whose title decodes to nothing has no title.
pub fn normalize_text(raw: &str) -> Option<String> {
    let stripped = strip_markup(raw);
    let decoded = html_escape::decode_html_entities(stripped.as_ref());
    let trimmed = decoded.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
