//! The decode-and-parse pipeline: sniff → resolve → decode → accumulate →
//! package.

use std::collections::BTreeMap;
use tagmill_core::{
    BackendKind, ClueSource, DocumentFragment, EncodingClue, Error, ParseConfig, ParseContext,
    ParsedDocument, ParserBackend, RawContent, Result,
};
use tracing::{debug, warn};

use crate::accumulate::{accumulate, AccumulationEnd};
use crate::dom::DomFragmentBackend;
use crate::encoding::{decode, resolve_encoding};
use crate::extract;
use crate::sax::LenientSaxBackend;
use crate::sniff::sniff_charset;

/// Upper bound on collected outlinks per document.
const MAX_OUTLINKS: usize = 500;

/// One configured pipeline. Construction fixes the configuration and the
/// backend; `parse` may then be called concurrently from any number of
/// threads, each invocation owning its own content and fragment.
pub struct ParsePipeline {
    cfg: ParseConfig,
    backend: Box<dyn ParserBackend>,
}

impl ParsePipeline {
    pub fn new(cfg: ParseConfig) -> Self {
        let backend: Box<dyn ParserBackend> = match cfg.backend {
            BackendKind::LenientSax => Box::new(LenientSaxBackend),
            BackendKind::DomFragment => Box::new(DomFragmentBackend {
                report_errors: cfg.report_parse_errors,
            }),
        };
        Self { cfg, backend }
    }

    pub fn config(&self) -> &ParseConfig {
        &self.cfg
    }

    /// Parse one fetched document.
    ///
    /// Never panics and never escalates tolerable conditions: a missing
    /// charset declaration, an empty body, or a backend that dies mid-stream
    /// all still produce a (possibly empty, possibly partial) success. Only
    /// a malformed base URL or a total encoding failure comes back as `Err`.
    pub fn parse(&self, raw: &RawContent) -> Result<ParsedDocument> {
        // The base URL gates everything; bad input never reaches the bytes.
        let base = url::Url::parse(&raw.base_url).map_err(|e| {
            warn!(url = %raw.base_url, error = %e, "rejecting malformed base url");
            Error::InvalidUrl(format!("{}: {e}", raw.base_url))
        })?;

        let mut metadata = BTreeMap::new();
        let mut warnings: Vec<&'static str> = Vec::new();

        if raw.bytes.is_empty() {
            debug!(url = %base, "empty byte body; returning empty document");
            warnings.push("empty_input");
            return Ok(ParsedDocument {
                fragment: DocumentFragment::default(),
                title: None,
                text: String::new(),
                outlinks: Vec::new(),
                metadata,
                warnings,
            });
        }

        let sniffed = sniff_charset(&raw.bytes, self.cfg.sniff_bytes);
        let clues = [
            EncodingClue::new(ClueSource::Protocol, raw.content_type_charset()),
            EncodingClue::new(ClueSource::Sniffed, sniffed),
        ];
        let resolved = resolve_encoding(&clues, &self.cfg.default_encoding);
        debug!(
            url = %base,
            charset = %resolved.name,
            source = resolved.source.as_str(),
            "encoding resolved"
        );
        metadata.insert("charset_resolved".to_string(), resolved.name.clone());
        metadata.insert(
            "charset_source".to_string(),
            resolved.source.as_str().to_string(),
        );

        let decoded = match decode(&raw.bytes, &resolved.name) {
            Some(d) => d,
            None => {
                // Exactly one retry, with the configured default.
                warn!(
                    url = %base,
                    charset = %resolved.name,
                    fallback = %self.cfg.default_encoding,
                    "unknown encoding; retrying with default"
                );
                warnings.push("charset_fallback");
                metadata.insert("charset_fallback".to_string(), "true".to_string());
                decode(&raw.bytes, &self.cfg.default_encoding).ok_or_else(|| {
                    Error::UnsupportedEncoding(format!(
                        "{} (default {} also unknown)",
                        resolved.name, self.cfg.default_encoding
                    ))
                })?
            }
        };
        metadata.insert(
            "charset_used".to_string(),
            decoded.encoding_used.to_ascii_lowercase(),
        );
        if decoded.had_replacements {
            warnings.push("decode_replacement_chars");
        }

        let acc = accumulate(
            self.backend.as_ref(),
            &decoded.text,
            ParseContext::Fragment,
            self.cfg.max_passes,
        );
        metadata.insert(
            "parse_backend".to_string(),
            self.backend.name().to_string(),
        );
        metadata.insert("parse_passes".to_string(), acc.passes.to_string());
        match &acc.end {
            AccumulationEnd::Exhausted => {}
            AccumulationEnd::BackendError(msg) => {
                warn!(url = %base, error = %msg, "parse ended early; packaging partial fragment");
                warnings.push("parse_partial");
                metadata.insert("parse_partial".to_string(), "true".to_string());
            }
            AccumulationEnd::PassCapReached => {
                warnings.push("parse_pass_cap_reached");
                metadata.insert("parse_partial".to_string(), "true".to_string());
            }
        }

        let fragment = acc.fragment;
        let title = extract::title(&fragment);
        let text = extract::text(&fragment);
        let outlinks = extract::outlinks(&fragment, &base, MAX_OUTLINKS);
        debug!(
            url = %base,
            nodes = fragment.node_count(),
            outlinks = outlinks.len(),
            "parse packaged"
        );

        Ok(ParsedDocument {
            fragment,
            title,
            text,
            outlinks,
            metadata,
            warnings,
        })
    }
}
