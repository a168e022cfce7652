//! Title, text, and outlink extraction over a finished fragment.
//!
//! Everything here is read-only over the tree the pipeline built; nothing
//! re-parses markup.

use std::collections::BTreeSet;
use tagmill_core::{DocumentFragment, Element, Node, Outlink};

/// Subtrees that carry no human-readable text.
const SKIP_TEXT: &[&str] = &["noscript", "script", "style"];

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the first `title` element in document order, whitespace-normalized.
pub fn title(fragment: &DocumentFragment) -> Option<String> {
    fn find(nodes: &[Node]) -> Option<&Element> {
        for node in nodes {
            if let Node::Element(el) = node {
                if el.name == "title" {
                    return Some(el);
                }
                if let Some(found) = find(&el.children) {
                    return Some(found);
                }
            }
        }
        None
    }
    let el = find(&fragment.children)?;
    let t = norm_ws(&element_text(el));
    (!t.is_empty()).then_some(t)
}

/// All visible text in document order, whitespace-normalized. Script, style
/// and noscript subtrees are excluded.
pub fn text(fragment: &DocumentFragment) -> String {
    let mut out = String::new();
    collect_text(&fragment.children, &mut out);
    norm_ws(&out)
}

fn element_text(el: &Element) -> String {
    let mut out = String::new();
    collect_text(&el.children, &mut out);
    out
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => {
                out.push_str(t);
                out.push(' ');
            }
            Node::Element(el) => {
                if SKIP_TEXT.contains(&el.name.as_str()) {
                    continue;
                }
                collect_text(&el.children, out);
            }
            Node::Comment(_) => {}
        }
    }
}

/// Collect outbound links from the fragment.
///
/// - `a`/`area` hrefs carry their subtree text as anchor; `frame`/`iframe`
///   sources carry an empty anchor.
/// - Resolves relative references against `base`.
/// - Skips `javascript:`/`mailto:` and drops URL fragments.
/// - Dedupes by URL (first anchor wins) and returns at most `max_links`.
pub fn outlinks(fragment: &DocumentFragment, base: &url::Url, max_links: usize) -> Vec<Outlink> {
    let max_links = max_links.min(500);
    let mut seen = BTreeSet::<String>::new();
    let mut out: Vec<Outlink> = Vec::new();
    walk_links(&fragment.children, base, max_links, &mut seen, &mut out);
    out
}

fn walk_links(
    nodes: &[Node],
    base: &url::Url,
    max_links: usize,
    seen: &mut BTreeSet<String>,
    out: &mut Vec<Outlink>,
) {
    for node in nodes {
        if out.len() >= max_links {
            return;
        }
        let Node::Element(el) = node else { continue };
        let candidate = match el.name.as_str() {
            "a" | "area" => el.attr("href").map(|h| (h, norm_ws(&element_text(el)))),
            "frame" | "iframe" => el.attr("src").map(|s| (s, String::new())),
            _ => None,
        };
        if let Some((href, anchor)) = candidate {
            if let Some(url) = resolve_href(base, href) {
                if seen.insert(url.clone()) {
                    out.push(Outlink { url, anchor });
                }
            }
        }
        walk_links(&el.children, base, max_links, seen, out);
    }
}

fn resolve_href(base: &url::Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let href_lc = href.to_ascii_lowercase();
    if href_lc.starts_with("javascript:") || href_lc.starts_with("mailto:") {
        return None;
    }

    let abs = match url::Url::parse(href) {
        Ok(u) => u,
        Err(_) => base.join(href).ok()?,
    };
    // Drop fragments for stability.
    let mut u = abs;
    u.set_fragment(None);
    Some(u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomFragmentBackend;
    use tagmill_core::{ParseContext, ParserBackend};

    fn fragment_of(html: &str) -> DocumentFragment {
        let backend = DomFragmentBackend {
            report_errors: false,
        };
        let mut source = backend.begin(html, ParseContext::Fragment);
        let mut fragment = DocumentFragment::default();
        loop {
            let batch = source.next_fragment().unwrap();
            if batch.is_empty() {
                return fragment;
            }
            fragment.children.extend(batch);
        }
    }

    #[test]
    fn title_takes_the_first_title_element() {
        let frag = fragment_of("<title>First</title><title>Second</title>");
        assert_eq!(title(&frag).as_deref(), Some("First"));
        assert_eq!(title(&fragment_of("<p>no title</p>")), None);
    }

    #[test]
    fn text_skips_script_style_and_comments() {
        let frag = fragment_of(
            "<div>Hello<script>var x = 1;</script><style>p{}</style><!-- c --> world</div>",
        );
        assert_eq!(text(&frag), "Hello world");
    }

    #[test]
    fn text_normalizes_whitespace() {
        let frag = fragment_of("<p>  a\n\n   b\t c </p>");
        assert_eq!(text(&frag), "a b c");
    }

    #[test]
    fn outlinks_resolve_dedupe_and_skip_schemes() {
        let base = url::Url::parse("https://example.com/dir/page.html").unwrap();
        let frag = fragment_of(
            "<a href=\"/a#frag\">A</a>\
             <a href=\"rel.html\">Rel</a>\
             <a href=\"https://other.example/b\">B</a>\
             <a href=\"/a\">A again</a>\
             <a href=\"mailto:x@example.com\">mail</a>\
             <a href=\"javascript:void(0)\">js</a>",
        );
        let links = outlinks(&frag, &base, 50);
        let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/a",
                "https://example.com/dir/rel.html",
                "https://other.example/b",
            ]
        );
        assert_eq!(links[0].anchor, "A");
    }

    #[test]
    fn frame_sources_become_anchorless_outlinks() {
        let base = url::Url::parse("https://example.com/").unwrap();
        let frag = fragment_of("<iframe src=\"/embedded\"></iframe>");
        let links = outlinks(&frag, &base, 50);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://example.com/embedded");
        assert_eq!(links[0].anchor, "");
    }

    #[test]
    fn outlink_count_is_bounded() {
        let base = url::Url::parse("https://example.com/").unwrap();
        let html: String = (0..40).map(|i| format!("<a href=\"/l{i}\">x</a>")).collect();
        let frag = fragment_of(&html);
        assert_eq!(outlinks(&frag, &base, 10).len(), 10);
    }
}
