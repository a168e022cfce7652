//! Lenient event-stream parsing over tag soup.
//!
//! quick-xml is strict by default; this backend relaxes the reader
//! (mismatched and unmatched end tags allowed) and repairs the rest: stray
//! closes are no-ops, open elements auto-close at sibling boundaries and at
//! end of input, and void elements never stay open. An unrecoverable reader
//! error first flushes the nodes the current batch gathered, then surfaces
//! on the following call, so the accumulator can keep the partial tree.

use quick_xml::events::{BytesStart, Event};
use tagmill_core::{Element, Error, FragmentSource, Node, ParseContext, ParserBackend, Result};

/// Top-level nodes handed out per `next_fragment` call.
const BATCH_NODES: usize = 64;

/// Elements that never take content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Opening one of these closes an open sibling of the same name.
const SELF_CLOSING_SIBLINGS: &[&str] = &["dd", "dt", "li", "option", "p", "td", "th", "tr"];

pub struct LenientSaxBackend;

impl ParserBackend for LenientSaxBackend {
    fn name(&self) -> &'static str {
        "lenient-sax"
    }

    fn begin<'a>(&'a self, input: &'a str, _ctx: ParseContext) -> Box<dyn FragmentSource + 'a> {
        // Event streams have no root requirement, so the context does not
        // change behavior for this variant.
        let mut reader = quick_xml::Reader::from_str(input);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        Box::new(SaxSession {
            reader,
            stack: Vec::new(),
            done: false,
            pending_error: None,
        })
    }
}

struct SaxSession<'a> {
    reader: quick_xml::Reader<&'a [u8]>,
    /// Open elements; all repairs operate on this.
    stack: Vec<Element>,
    done: bool,
    /// Reader error held back until the gathered batch has been delivered.
    pending_error: Option<String>,
}

impl SaxSession<'_> {
    fn attach(&mut self, out: &mut Vec<Node>, node: Node) {
        match self.stack.last_mut() {
            Some(open) => open.children.push(node),
            None => out.push(node),
        }
    }

    /// Pop the top open element and attach it one level down.
    fn close_top(&mut self, out: &mut Vec<Node>) {
        if let Some(el) = self.stack.pop() {
            self.attach(out, Node::Element(el));
        }
    }

    fn open_element(&mut self, out: &mut Vec<Node>, el: Element, force_leaf: bool) {
        if SELF_CLOSING_SIBLINGS.contains(&el.name.as_str())
            && self.stack.last().map(|open| open.name == el.name).unwrap_or(false)
        {
            self.close_top(out);
        }
        if force_leaf || VOID_ELEMENTS.contains(&el.name.as_str()) {
            self.attach(out, Node::Element(el));
        } else {
            self.stack.push(el);
        }
    }

    /// A close matching a deeper open element auto-closes everything above
    /// it; a close matching nothing is a no-op.
    fn close_element(&mut self, out: &mut Vec<Node>, name: &str) {
        let Some(depth) = self.stack.iter().rposition(|open| open.name == name) else {
            return;
        };
        while self.stack.len() > depth + 1 {
            self.close_top(out);
        }
        self.close_top(out);
    }

    fn finish(&mut self, out: &mut Vec<Node>) {
        while !self.stack.is_empty() {
            self.close_top(out);
        }
        self.done = true;
    }
}

fn element_from_start(e: &BytesStart) -> Element {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
    let mut el = Element::new(name);
    for a in e.attributes().flatten() {
        let k = String::from_utf8_lossy(a.key.as_ref()).to_ascii_lowercase();
        // Keep the raw value when unescaping fails; dropping the attribute
        // would lose hrefs over a single bad entity.
        let v = a
            .unescape_value()
            .map(|v| v.to_string())
            .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).to_string());
        el.attrs.push((k, v));
    }
    el
}

/// Resolve a character/entity reference name; `None` keeps it as literal
/// text.
fn resolve_reference(name: &str) -> Option<String> {
    match name {
        "amp" => return Some("&".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "quot" => return Some("\"".to_string()),
        "apos" => return Some("'".to_string()),
        "nbsp" => return Some("\u{a0}".to_string()),
        _ => {}
    }
    let num = name.strip_prefix('#')?;
    let code = if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        num.parse::<u32>().ok()?
    };
    char::from_u32(code).map(|c| c.to_string())
}

impl FragmentSource for SaxSession<'_> {
    fn next_fragment(&mut self) -> Result<Vec<Node>> {
        if let Some(msg) = self.pending_error.take() {
            return Err(Error::ParseBackend(msg));
        }
        if self.done {
            return Ok(Vec::new());
        }

        let mut out: Vec<Node> = Vec::new();
        let mut buf = Vec::new();
        loop {
            if out.len() >= BATCH_NODES {
                return Ok(out);
            }
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Eof) => {
                    self.finish(&mut out);
                    return Ok(out);
                }
                Ok(Event::Start(e)) => {
                    let el = element_from_start(&e);
                    self.open_element(&mut out, el, false);
                }
                Ok(Event::Empty(e)) => {
                    let el = element_from_start(&e);
                    self.open_element(&mut out, el, true);
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                    self.close_element(&mut out, &name);
                }
                Ok(Event::Text(t)) => {
                    let txt = t
                        .decode()
                        .map(|t| t.to_string())
                        .unwrap_or_else(|_| String::from_utf8_lossy(t.as_ref()).to_string());
                    if !txt.is_empty() {
                        self.attach(&mut out, Node::Text(txt));
                    }
                }
                Ok(Event::CData(t)) => {
                    let txt = String::from_utf8_lossy(t.as_ref()).to_string();
                    if !txt.is_empty() {
                        self.attach(&mut out, Node::Text(txt));
                    }
                }
                Ok(Event::Comment(t)) => {
                    let txt = String::from_utf8_lossy(t.as_ref()).to_string();
                    self.attach(&mut out, Node::Comment(txt));
                }
                Ok(Event::GeneralRef(r)) => {
                    let name = String::from_utf8_lossy(r.as_ref()).to_string();
                    let txt = resolve_reference(&name).unwrap_or_else(|| format!("&{name};"));
                    self.attach(&mut out, Node::Text(txt));
                }
                // Declarations, processing instructions, doctype.
                Ok(_) => {}
                Err(e) => {
                    let msg = e.to_string();
                    self.finish(&mut out);
                    self.pending_error = Some(msg);
                    return Ok(out);
                }
            }
            buf.clear();
        }
    }
}
