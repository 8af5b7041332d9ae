//! The small markdown subset documents are displayed with: bold, italic,
//! three heading levels, images and hard line breaks. Source text is
//! HTML-escaped before any markup is produced.

use once_cell::sync::Lazy;
use regex::Regex;

static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static IMAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").unwrap());

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn safe_src(src: &str) -> bool {
    (src.starts_with('/') && !src.starts_with("//"))
        || src.starts_with("http://")
        || src.starts_with("https://")
}

/// Render document content to an HTML fragment.
pub fn render(content: &str) -> String {
    let escaped = escape_html(&content.replace("\r\n", "\n"));
    escaped
        .split('\n')
        .map(render_line)
        .collect::<Vec<_>>()
        .join("<br />")
}

fn render_line(line: &str) -> String {
    for (marker, level) in [("### ", 3), ("## ", 2), ("# ", 1)] {
        if let Some(text) = line.strip_prefix(marker) {
            return format!(
                r#"<h{level} class="md-h{level}">{}</h{level}>"#,
                render_inline(text)
            );
        }
    }
    render_inline(line)
}

// Image spans are emitted verbatim; emphasis only applies between them.
fn render_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest_from = 0;
    for caps in IMAGE_RE.captures_iter(text) {
        let Some(span) = caps.get(0) else { continue };
        out.push_str(&emphasis(&text[rest_from..span.start()]));
        let (alt, src) = (&caps[1], &caps[2]);
        if safe_src(src) {
            out.push_str(&format!(r#"<img src="{src}" alt="{alt}" class="md-img" />"#));
        } else {
            out.push_str(&emphasis(span.as_str()));
        }
        rest_from = span.end();
    }
    out.push_str(&emphasis(&text[rest_from..]));
    out
}

fn emphasis(text: &str) -> String {
    let bold = BOLD_RE.replace_all(text, "<strong>$1</strong>");
    ITALIC_RE.replace_all(&bold, "<em>$1</em>").into_owned()
}
