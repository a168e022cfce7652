//! Encoding clue resolution and byte decoding.

use tagmill_core::{ClueSource, EncodingClue, ResolvedEncoding};

/// Name-normalize a candidate encoding label: trim, strip one layer of
/// quotes, ASCII-lowercase. Returns `None` unless the result has the shape
/// of an encoding name (`[a-z][a-z0-9._-]*`).
pub fn normalize_label(raw: &str) -> Option<String> {
    let s = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if s.is_empty() {
        return None;
    }
    let lower = s.to_ascii_lowercase();
    let mut chars = lower.chars();
    if !chars.next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false) {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
        return None;
    }
    Some(lower)
}

/// Pick one encoding from clues in caller priority order; the default is
/// last.
///
/// The first clue with a structurally valid name wins. Validity is purely
/// syntactic — whether the name maps to a real decoder is the decode step's
/// problem, so an unknown-but-plausible high-priority clue still beats a
/// good lower-priority one. Deterministic; never retries.
pub fn resolve_encoding(clues: &[EncodingClue], default_encoding: &str) -> ResolvedEncoding {
    for clue in clues {
        if let Some(name) = clue.name.as_deref().and_then(normalize_label) {
            return ResolvedEncoding {
                name,
                source: clue.source,
            };
        }
    }
    let name = normalize_label(default_encoding).unwrap_or_else(|| "utf-8".to_string());
    ResolvedEncoding {
        name,
        source: ClueSource::Default,
    }
}

/// Outcome of a byte decode.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub text: String,
    /// Canonical name of the decoder actually used (label aliasing means
    /// this can differ from the requested label, e.g. ISO-8859-1 decodes as
    /// windows-1252).
    pub encoding_used: &'static str,
    /// True when malformed sequences were replaced.
    pub had_replacements: bool,
}

/// Decode `bytes` under a WHATWG encoding label.
///
/// Returns `None` when the label names no known decoder, so the caller can
/// apply its fallback. Malformed sequences are replaced, never fatal; a
/// leading BOM is honored best-effort and stripped.
pub fn decode(bytes: &[u8], label: &str) -> Option<Decoded> {
    let enc = encoding_rs::Encoding::for_label(label.as_bytes())?;
    let (text, used, had_replacements) = enc.decode(bytes);
    Some(Decoded {
        text: text.into_owned(),
        encoding_used: used.name(),
        had_replacements,
    })
}
