//! DOM-fragment parsing via html5ever.
//!
//! The whole input is parsed on the first call; the resulting top-level
//! nodes are handed out in bounded batches so the accumulator contract is
//! the same as for the event-stream variant.

use std::collections::VecDeque;
use tagmill_core::{Element, FragmentSource, Node, ParseContext, ParserBackend, Result};
use tracing::trace;

/// Top-level nodes handed out per `next_fragment` call.
const BATCH_NODES: usize = 64;

/// HTML element names this backend keeps. Anything else is a bogus element:
/// its tag is dropped and its children spliced into the parent.
const KNOWN_ELEMENTS: &[&str] = &[
    "a", "abbr", "address", "area", "article", "aside", "audio", "b", "base", "bdi", "bdo", "big",
    "blockquote", "body", "br", "button", "canvas", "caption", "center", "cite", "code", "col",
    "colgroup", "data", "datalist", "dd", "del", "details", "dfn", "dialog", "div", "dl", "dt",
    "em", "embed", "fieldset", "figcaption", "figure", "font", "footer", "form", "frame",
    "frameset", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hgroup", "hr", "html", "i",
    "iframe", "img", "input", "ins", "kbd", "label", "legend", "li", "link", "main", "map", "mark",
    "menu", "meta", "meter", "nav", "noframes", "noscript", "object", "ol", "optgroup", "option",
    "output", "p", "param", "picture", "pre", "progress", "q", "rp", "rt", "ruby", "s", "samp",
    "script", "section", "select", "small", "source", "span", "strike", "strong", "style", "sub",
    "summary", "sup", "table", "tbody", "td", "template", "textarea", "tfoot", "th", "thead",
    "time", "title", "tr", "track", "tt", "u", "ul", "var", "video", "wbr",
];

pub struct DomFragmentBackend {
    /// Forward the parser's collected error strings to trace logging.
    pub report_errors: bool,
}

impl ParserBackend for DomFragmentBackend {
    fn name(&self) -> &'static str {
        "dom-fragment"
    }

    fn begin<'a>(&'a self, input: &'a str, ctx: ParseContext) -> Box<dyn FragmentSource + 'a> {
        Box::new(DomSession {
            input,
            ctx,
            report_errors: self.report_errors,
            parsed: None,
            done: false,
        })
    }
}

struct DomSession<'a> {
    input: &'a str,
    ctx: ParseContext,
    report_errors: bool,
    /// Filled lazily on the first call.
    parsed: Option<VecDeque<Node>>,
    done: bool,
}

impl FragmentSource for DomSession<'_> {
    fn next_fragment(&mut self) -> Result<Vec<Node>> {
        if self.done {
            return Ok(Vec::new());
        }
        if self.parsed.is_none() {
            let nodes = parse_all(self.input, self.ctx, self.report_errors);
            self.parsed = Some(nodes.into());
        }
        let mut out = Vec::new();
        if let Some(queue) = self.parsed.as_mut() {
            while out.len() < BATCH_NODES {
                match queue.pop_front() {
                    Some(node) => out.push(node),
                    None => {
                        self.done = true;
                        break;
                    }
                }
            }
        }
        Ok(out)
    }
}

fn parse_all(input: &str, ctx: ParseContext, report_errors: bool) -> Vec<Node> {
    let doc = match ctx {
        ParseContext::Document => html_scraper::Html::parse_document(input),
        ParseContext::Fragment => html_scraper::Html::parse_fragment(input),
    };
    if report_errors && tracing::enabled!(tracing::Level::TRACE) {
        for err in &doc.errors {
            trace!(error = %err, "dom parse error");
        }
    }

    let mut out = Vec::new();
    for child in doc.tree.root().children() {
        // Fragment parsing wraps content in a synthetic <html> element; a
        // rootless fragment must not keep that wrapper.
        if ctx == ParseContext::Fragment {
            if let html_scraper::Node::Element(el) = child.value() {
                if el.name() == "html" {
                    for c in child.children() {
                        convert(c, &mut out);
                    }
                    continue;
                }
            }
        }
        convert(child, &mut out);
    }
    out
}

fn convert(node: ego_tree::NodeRef<'_, html_scraper::Node>, out: &mut Vec<Node>) {
    match node.value() {
        html_scraper::Node::Element(el) => {
            let name = el.name().to_ascii_lowercase();
            if !KNOWN_ELEMENTS.contains(&name.as_str()) {
                for child in node.children() {
                    convert(child, out);
                }
                return;
            }
            let mut elem = Element::new(name);
            for (k, v) in el.attrs() {
                elem.attrs.push((k.to_ascii_lowercase(), v.to_string()));
            }
            for child in node.children() {
                convert(child, &mut elem.children);
            }
            out.push(Node::Element(elem));
        }
        html_scraper::Node::Text(t) => {
            let txt: &str = &t;
            if !txt.is_empty() {
                out.push(Node::Text(txt.to_string()));
            }
        }
        html_scraper::Node::Comment(c) => {
            let txt: &str = &c;
            out.push(Node::Comment(txt.to_string()));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_whole(input: &str) -> Vec<Node> {
        let backend = DomFragmentBackend {
            report_errors: false,
        };
        let mut source = backend.begin(input, ParseContext::Fragment);
        let mut out = Vec::new();
        loop {
            let batch = source.next_fragment().expect("dom backend never errors");
            if batch.is_empty() {
                return out;
            }
            out.extend(batch);
        }
    }

    #[test]
    fn parses_tag_soup_into_a_tree() {
        let nodes = parse_whole("<div><p>one<p>two</div>");
        assert_eq!(nodes.len(), 1);
        let div = nodes[0].as_element().unwrap();
        let ps: Vec<_> = div
            .children
            .iter()
            .filter_map(Node::as_element)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(ps, vec!["p", "p"]);
    }

    #[test]
    fn fragment_mode_allows_multiple_roots() {
        let nodes = parse_whole("<p>a</p><p>b</p>");
        let names: Vec<_> = nodes
            .iter()
            .filter_map(Node::as_element)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["p", "p"]);
    }

    #[test]
    fn unknown_elements_are_dropped_but_children_kept() {
        let nodes = parse_whole("<bogon><p>kept</p></bogon>");
        assert_eq!(nodes.len(), 1);
        let p = nodes[0].as_element().unwrap();
        assert_eq!(p.name, "p");
        assert_eq!(p.children, vec![Node::Text("kept".to_string())]);
    }

    #[test]
    fn attributes_survive_conversion() {
        let nodes = parse_whole("<a href=\"/x\" TITLE=\"t\">go</a>");
        let a = nodes[0].as_element().unwrap();
        assert_eq!(a.attr("href"), Some("/x"));
        assert_eq!(a.attr("title"), Some("t"));
    }

    #[test]
    fn large_input_is_delivered_in_bounded_batches() {
        let input: String = (0..150).map(|i| format!("<p>{i}</p>")).collect();
        let backend = DomFragmentBackend {
            report_errors: false,
        };
        let mut source = backend.begin(&input, ParseContext::Fragment);
        let first = source.next_fragment().unwrap();
        assert_eq!(first.len(), BATCH_NODES);
        let second = source.next_fragment().unwrap();
        assert_eq!(second.len(), BATCH_NODES);
        let third = source.next_fragment().unwrap();
        assert_eq!(third.len(), 150 - 2 * BATCH_NODES);
        assert!(source.next_fragment().unwrap().is_empty());
    }

    #[test]
    fn whitespace_only_input_exhausts_immediately() {
        let backend = DomFragmentBackend {
            report_errors: false,
        };
        let mut source = backend.begin("   ", ParseContext::Fragment);
        // The call consumed input yet produced nothing; that is exhaustion,
        // not an error.
        let first = source.next_fragment().unwrap();
        assert!(first.len() <= 1);
        assert!(source.next_fragment().unwrap().is_empty());
    }
}
