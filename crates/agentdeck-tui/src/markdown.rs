//! Terminal rendering of formatted chat messages.

use agentdeck_core::formatter::{Inline, ListKind, Segment};
use agentdeck_core::render::SegmentRenderer;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use crate::theme::Theme;

/// Renders each segment as styled terminal lines
pub struct LineRenderer {
    theme: Theme,
}

impl LineRenderer {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }

    /// Inline spans to lines, breaking wherever the text has a newline
    fn inline_lines(&self, spans: &[Inline], base: Style) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let mut current: Vec<Span<'static>> = Vec::new();

        for span in spans {
            let (text, style) = match span {
                Inline::Text(s) => (s.as_str(), base),
                Inline::Strong(s) => (s.as_str(), base.add_modifier(Modifier::BOLD)),
                Inline::Emphasis(s) => (s.as_str(), base.add_modifier(Modifier::ITALIC)),
                Inline::Code(s) => (s.as_str(), self.theme.code()),
                Inline::Link { text, url } => {
                    current.push(Span::styled(text.clone(), self.theme.link()));
                    current.push(Span::styled(format!(" <{url}>"), self.theme.muted()));
                    continue;
                }
            };

            let mut parts = text.split('\n');
            if let Some(first) = parts.next() {
                if !first.is_empty() {
                    current.push(Span::styled(first.to_string(), style));
                }
            }
            for part in parts {
                lines.push(Line::from(std::mem::take(&mut current)));
                if !part.is_empty() {
                    current.push(Span::styled(part.to_string(), style));
                }
            }
        }

        lines.push(Line::from(current));
        lines
    }
}

impl SegmentRenderer for LineRenderer {
    type Output = Vec<Line<'static>>;

    fn render_segment(&mut self, segment: &Segment) -> Vec<Line<'static>> {
        match segment {
            Segment::Heading { level, text } => {
                let mut style = self.theme.heading();
                if *level > 1 {
                    style = style.remove_modifier(Modifier::UNDERLINED);
                }
                let mut lines = self.inline_lines(text, style);
                if let Some(first) = lines.first_mut() {
                    let marker = "#".repeat(*level as usize) + " ";
                    first.spans.insert(0, Span::styled(marker, self.theme.muted()));
                }
                lines
            }
            Segment::List { kind, items } => {
                let mut lines = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    let marker = match kind {
                        ListKind::Unordered => "  • ".to_string(),
                        ListKind::Ordered => format!("  {}. ", i + 1),
                    };
                    let item_lines = self.inline_lines(item, Style::default());
                    for (j, mut line) in item_lines.into_iter().enumerate() {
                        let prefix = if j == 0 {
                            marker.clone()
                        } else {
                            " ".repeat(marker.chars().count())
                        };
                        line.spans.insert(0, Span::styled(prefix, self.theme.muted()));
                        lines.push(line);
                    }
                }
                lines
            }
            Segment::CodeBlock { language, lines: code } => {
                let label = language.as_deref().unwrap_or("code");
                let header = Span::styled(format!("┌─ {label}"), self.theme.muted());
                let mut lines = vec![Line::from(header)];
                for code_line in code {
                    lines.push(Line::from(vec![
                        Span::styled("│ ", self.theme.muted()),
                        Span::styled(code_line.clone(), self.theme.code()),
                    ]));
                }
                lines.push(Line::from(Span::styled("└─", self.theme.muted())));
                lines
            }
            Segment::Paragraph(spans) => self.inline_lines(spans, Style::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdeck_core::formatter::FormatOptions;
    use agentdeck_core::render::render_message;

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn render(content: &str) -> Vec<String> {
        let mut renderer = LineRenderer::new(Theme::Dark);
        let segments = render_message(&mut renderer, content, &FormatOptions::default())
            .unwrap_or_default();
        let lines: Vec<Line<'static>> = segments.into_iter().flatten().collect();
        plain(&lines)
    }

    #[test]
    fn test_paragraph_newlines_become_lines() {
        assert_eq!(render("first\nsecond"), vec!["first", "second"]);
    }

    #[test]
    fn test_code_block_is_framed() {
        assert_eq!(
            render("```python\nx=1\n```"),
            vec!["┌─ python", "│ x=1", "└─"]
        );
    }

    #[test]
    fn test_list_markers() {
        assert_eq!(render("- a\n- b\n1. c"), vec!["  • a", "  • b", "  1. c"]);
    }

    #[test]
    fn test_bold_is_styled() {
        let mut renderer = LineRenderer::new(Theme::Dark);
        let lines = render_message(&mut renderer, "say **hi**", &FormatOptions::default()).unwrap();
        let bold = &lines[0][0].spans[1];
        assert_eq!(bold.content, "hi");
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_blank_message_renders_nothing() {
        let mut renderer = LineRenderer::new(Theme::Dark);
        assert!(render_message(&mut renderer, "  \n ", &FormatOptions::default()).is_none());
    }
}
