use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("parse backend failure: {0}")]
    ParseBackend(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One fetched document, as handed over by a caller-side fetch layer.
///
/// Notes:
/// - `bytes` is the raw body; no encoding is assumed.
/// - `metadata` carries transport headers and the like. Lookup is
///   case-insensitive via [`RawContent::header`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContent {
    pub base_url: String,
    pub bytes: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
}

impl RawContent {
    pub fn new(base_url: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            base_url: base_url.into(),
            bytes,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(
        base_url: impl Into<String>,
        bytes: Vec<u8>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            bytes,
            metadata,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.metadata
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `charset` parameter of a declared content-type header, if any.
    pub fn content_type_charset(&self) -> Option<String> {
        let ct = self.header("content-type")?;
        for part in ct.split(';').skip(1) {
            let (key, value) = match part.split_once('=') {
                Some(kv) => kv,
                None => continue,
            };
            if key.trim().eq_ignore_ascii_case("charset") {
                let value = value.trim().trim_matches(|c| c == '"' || c == '\'').trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
        None
    }
}

/// Where a candidate encoding name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClueSource {
    /// Declared by the transport (content-type header).
    Protocol,
    /// Found by scanning the byte prefix for a meta declaration.
    Sniffed,
    /// The configured default.
    Default,
}

impl ClueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClueSource::Protocol => "protocol",
            ClueSource::Sniffed => "sniffed",
            ClueSource::Default => "default",
        }
    }
}

/// A candidate encoding name with its provenance. Never mutated after
/// creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingClue {
    pub source: ClueSource,
    pub name: Option<String>,
}

impl EncodingClue {
    pub fn new(source: ClueSource, name: Option<String>) -> Self {
        Self { source, name }
    }
}

/// The single chosen encoding, with the clue that won.
///
/// Invariant: `name` is non-empty and normalized (trimmed, unquoted,
/// ASCII-lowercased). Whether it maps to a real decoder is decided later, at
/// the decode step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEncoding {
    pub name: String,
    pub source: ClueSource,
}

/// One markup node. Each node is owned by exactly one parent; the tree has no
/// cycles by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Node count of this subtree, self included.
    pub fn subtree_len(&self) -> usize {
        match self {
            Node::Element(el) => 1 + el.children.iter().map(Node::subtree_len).sum::<usize>(),
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Lowercased tag name.
    pub name: String,
    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// First attribute with this (lowercased) name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// An ordered tree of markup nodes with no single-root requirement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentFragment {
    pub children: Vec<Node>,
}

impl DocumentFragment {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Total node count across the whole tree.
    pub fn node_count(&self) -> usize {
        self.children.iter().map(Node::subtree_len).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outlink {
    pub url: String,
    /// Anchor text, whitespace-normalized; empty for frame sources.
    pub anchor: String,
}

/// A successfully parsed document: the fragment plus everything extracted
/// from it. Handed read-only to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedDocument {
    pub fragment: DocumentFragment,
    pub title: Option<String>,
    pub text: String,
    pub outlinks: Vec<Outlink>,
    /// Per-document parse facts (resolved charset, backend, pass count, ...).
    pub metadata: BTreeMap<String, String>,
    pub warnings: Vec<&'static str>,
}

/// Which tolerant parser implementation the pipeline drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    LenientSax,
    DomFragment,
}

/// Read-only pipeline configuration, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Used when no clue resolves, and as the single decode fallback.
    pub default_encoding: String,
    pub backend: BackendKind,
    /// Bytes of the prefix scanned for a meta charset declaration.
    pub sniff_bytes: usize,
    /// Defensive cap on accumulator passes.
    pub max_passes: usize,
    /// Forward backend error details to trace-level logging.
    pub report_parse_errors: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            default_encoding: "windows-1252".to_string(),
            backend: BackendKind::DomFragment,
            sniff_bytes: 2_000,
            max_passes: 512,
            report_parse_errors: false,
        }
    }
}

/// Whole-document vs rootless-fragment parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseContext {
    Document,
    Fragment,
}

/// A tolerant parse strategy. The pipeline selects one implementation at
/// construction time; both variants share this contract.
pub trait ParserBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Begin a parse over decoded input. The returned session yields bounded
    /// batches of top-level nodes until exhausted.
    fn begin<'a>(&'a self, input: &'a str, ctx: ParseContext) -> Box<dyn FragmentSource + 'a>;
}

/// One in-flight parse. A call may return an empty batch even though it
/// consumed input; that is the exhaustion signal, not an error.
pub trait FragmentSource {
    fn next_fragment(&mut self) -> Result<Vec<Node>>;
}
