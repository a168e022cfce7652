//! Bounded-prefix charset sniffing.
//!
//! Some documents put the meta tag well past the first kilobyte, so the
//! default bound is a couple thousand bytes rather than a few hundred.

/// Scan at most `max_scan` bytes of `bytes` for a `meta`-declared charset.
///
/// Each byte is promoted to a char independently (no multi-byte decoding is
/// attempted); only ASCII-range marker text matters here, so high bytes
/// simply never match. Accepted forms, first match in scan order wins:
/// - `<meta http-equiv="content-type" content="text/html; charset=X">`
/// - `<meta charset="X">`
///
/// Returns `None` when no meta tag in the prefix carries a charset token.
/// Never errors: malformed ranges just fail to match.
pub fn sniff_charset(bytes: &[u8], max_scan: usize) -> Option<String> {
    let len = bytes.len().min(max_scan);
    let head: String = bytes[..len].iter().map(|&b| b as char).collect();
    let lower = head.to_ascii_lowercase();

    let mut at = 0usize;
    while let Some(rel) = lower[at..].find("<meta") {
        let start = at + rel;
        let end = match lower[start..].find('>') {
            Some(d) => start + d,
            None => lower.len(),
        };
        let tag = &lower[start..end];
        if let Some(name) = charset_token(tag) {
            return Some(name);
        }
        if end >= lower.len() {
            break;
        }
        at = end + 1;
    }
    None
}

/// Extract the identifier following a `charset=` token inside lowercased
/// attribute text. Quoted and unquoted values are both accepted; the name
/// must start with a letter.
fn charset_token(tag: &str) -> Option<String> {
    let at = tag.find("charset")?;
    let rest = tag[at + "charset".len()..].trim_start();
    let rest = rest.strip_prefix('=')?;
    let rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'');

    let mut out = String::new();
    for ch in rest.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            out.push(ch);
        } else {
            break;
        }
    }
    if out.starts_with(|c: char| c.is_ascii_alphabetic()) {
        Some(out)
    } else {
        None
    }
}
