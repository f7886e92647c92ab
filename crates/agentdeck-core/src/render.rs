//! Renderers that turn formatter segments into something a view can show.

use crate::formatter::{self, FormatOptions, Inline, ListKind, Segment};

/// View-update interface over the formatter's segment variants
pub trait SegmentRenderer {
    type Output;

    fn render_segment(&mut self, segment: &Segment) -> Self::Output;
}

/// Format `content` and render every segment.
///
/// Returns `None` when the message has nothing to show, so callers can skip
/// the bubble entirely.
pub fn render_message<R: SegmentRenderer>(
    renderer: &mut R,
    content: &str,
    options: &FormatOptions,
) -> Option<Vec<R::Output>> {
    let segments = formatter::format(content, options);
    if segments.is_empty() {
        return None;
    }
    Some(segments.iter().map(|s| renderer.render_segment(s)).collect())
}

/// Escaped HTML markup, one element per segment
#[derive(Debug, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    fn inline(spans: &[Inline]) -> String {
        let mut out = String::new();
        for span in spans {
            match span {
                Inline::Text(s) => out.push_str(&escape_html(s).replace('\n', "<br>")),
                Inline::Strong(s) => out.push_str(&format!("<strong>{}</strong>", escape_html(s))),
                Inline::Emphasis(s) => out.push_str(&format!("<em>{}</em>", escape_html(s))),
                Inline::Code(s) => out.push_str(&format!("<code>{}</code>", escape_html(s))),
                Inline::Link { text, url } if is_safe_url(url) => out.push_str(&format!(
                    "<a href=\"{}\" target=\"_blank\" rel=\"noopener\">{}</a>",
                    escape_html(url),
                    escape_html(text)
                )),
                Inline::Link { text, .. } => out.push_str(&escape_html(text)),
            }
        }
        out
    }
}

impl SegmentRenderer for HtmlRenderer {
    type Output = String;

    fn render_segment(&mut self, segment: &Segment) -> String {
        match segment {
            Segment::Heading { level, text } => {
                format!("<h{level}>{}</h{level}>", Self::inline(text))
            }
            Segment::List { kind, items } => {
                let tag = match kind {
                    ListKind::Ordered => "ol",
                    ListKind::Unordered => "ul",
                };
                let body: String = items
                    .iter()
                    .map(|item| format!("<li>{}</li>", Self::inline(item)))
                    .collect();
                format!("<{tag}>{body}</{tag}>")
            }
            Segment::CodeBlock { language, lines } => {
                let class = language
                    .as_deref()
                    .map(|l| format!(" class=\"language-{}\"", escape_html(l)))
                    .unwrap_or_default();
                let body = lines
                    .iter()
                    .map(|l| escape_html(l))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("<pre><code{class}>{body}</code></pre>")
            }
            Segment::Paragraph(text) => format!("<p>{}</p>", Self::inline(text)),
        }
    }
}

/// Plain text for terminals without styling, e.g. piped CLI output
#[derive(Debug, Default)]
pub struct PlainTextRenderer;

impl SegmentRenderer for PlainTextRenderer {
    type Output = String;

    fn render_segment(&mut self, segment: &Segment) -> String {
        match segment {
            Segment::Heading { level, text } => {
                format!("{} {}", "#".repeat(*level as usize), formatter::inline_text(text))
            }
            Segment::List { kind, items } => items
                .iter()
                .enumerate()
                .map(|(i, item)| match kind {
                    ListKind::Ordered => format!("{}. {}", i + 1, formatter::inline_text(item)),
                    ListKind::Unordered => format!("• {}", formatter::inline_text(item)),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Segment::CodeBlock { lines, .. } => lines
                .iter()
                .map(|l| format!("    {l}"))
                .collect::<Vec<_>>()
                .join("\n"),
            Segment::Paragraph(text) => formatter::inline_text(text),
        }
    }
}

/// Only web and mail links become anchors
fn is_safe_url(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once(':') else {
        return false;
    };
    ["http", "https", "mailto"]
        .iter()
        .any(|allowed| scheme.eq_ignore_ascii_case(allowed))
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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
