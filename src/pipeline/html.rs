//! HTML body to plain text.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};

static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{2,}").unwrap());

/// Render an HTML document as text.
///
/// `style`, `script`, `head` and `title` are dropped, `<br>` becomes a
/// newline, table cells end with a space, and rows and paragraphs end with a
/// newline. Blank-line runs collapse to one blank line and leading newlines
/// are removed.
pub fn render_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len());
    render_element(document.root_element(), &mut out);

    let collapsed = BLANK_LINES.replace_all(&out, "\n\n");
    collapsed.trim_start_matches('\n').to_string()
}

fn render_element(element: ElementRef<'_>, out: &mut String) {
    match element.value().name() {
        "style" | "script" | "head" | "title" => {}
        "br" => out.push('\n'),
        "td" | "th" => {
            render_children(element, out);
            out.push(' ');
        }
        "tr" | "p" => {
            render_children(element, out);
            out.push('\n');
        }
        _ => render_children(element, out),
    }
}

fn render_children(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    render_element(child, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_and_breaks() {
        assert_eq!(render_text("<p>Hello<br>there</p><p>again</p>"), "Hello\nthere\nagain\n");
    }

    #[test]
    fn drops_invisible_elements() {
        let html = "<html><head><title>T</title><style>p { color: red }</style></head>\
                    <body><script>alert(1)</script><p>body</p></body></html>";
        assert_eq!(render_text(html), "body\n");
    }

    #[test]
    fn tables() {
        let html = "<table><tr><th>k</th><th>v</th></tr><tr><td>a</td><td>1</td></tr></table>";
        assert_eq!(render_text(html), "k v \na 1 \n");
    }

    #[test]
    fn collapses_blank_lines_and_strips_leading_newlines() {
        assert_eq!(render_text("<div>\n\n<p>a</p>\n\n\n<p>b</p></div>"), "a\n\nb\n");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(render_text("<p>a &amp; b &lt;c&gt;</p>"), "a & b <c>\n");
    }

    #[test]
    fn comments_are_ignored() {
        assert_eq!(render_text("<p>a<!-- hidden -->b</p>"), "ab\n");
    }
}
