//! Turns a chat message body into typed display segments.
//!
//! The formatter makes a single forward pass over the lines of a message.
//! Fenced code (```` ```lang ````) is kept verbatim, lines that start with one
//! of the backend's command/interpreter prompts open an implicit code block,
//! and everything else is scanned for headings, list items and inline
//! emphasis. It never fails: anything it does not recognise is prose.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

const FENCE: &str = "```";

/// Prompt prefixes the backend puts in front of command and code output
const SENTINELS: &[(&str, &str)] = &[
    ("Bash ❯", "bash"),
    ("❯ Command:", "bash"),
    ("IPython ❯", "python"),
    ("❯ Code:", "python"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Strong(String),
    Emphasis(String),
    Code(String),
    Link { text: String, url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Ordered,
    Unordered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Heading { level: u8, text: Vec<Inline> },
    List { kind: ListKind, items: Vec<Vec<Inline>> },
    CodeBlock { language: Option<String>, lines: Vec<String> },
    Paragraph(Vec<Inline>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Whether a bare prompt line opens a code block without a fence
    pub implicit_code_blocks: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            implicit_code_blocks: true,
        }
    }
}

/// Format a message body into display segments, in input order.
///
/// Empty or whitespace-only input yields no segments; callers should not
/// render a bubble for it.
pub fn format(content: &str, options: &FormatOptions) -> Vec<Segment> {
    let content = strip_terminal_codes(content);
    let mut state = FormatState::new(*options);
    for line in content.lines() {
        state.push_line(line.trim_end_matches('\r'));
    }
    state.finish()
}

/// Returns the language implied by a prompt sentinel at the start of `line`
pub fn sentinel_language(line: &str) -> Option<&'static str> {
    let line = line.trim_start();
    SENTINELS
        .iter()
        .find(|(prefix, _)| line.starts_with(prefix))
        .map(|(_, language)| *language)
}

/// Remove ANSI escape sequences left over from terminal output
pub fn strip_terminal_codes(text: &str) -> Cow<'_, str> {
    static ANSI: OnceLock<Option<Regex>> = OnceLock::new();
    let re = ANSI.get_or_init(|| Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").ok());
    match re {
        Some(re) => re.replace_all(text, ""),
        None => Cow::Borrowed(text),
    }
}

/// Apply strong/emphasis/inline-code/link substitutions to a run of text
pub fn format_inline(text: &str) -> Vec<Inline> {
    static INLINE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = INLINE.get_or_init(|| {
        Regex::new(concat!(
            r"\*\*(?P<strong>[^*]+?)\*\*",
            r"|`(?P<code>[^`]+)`",
            r"|\[(?P<link_text>[^\]]+)\]\((?P<url>(?:[^()\s]|\([^()\s]*\))+)\)",
            r"|\*(?P<em>[^*\s][^*]*?)\*",
            r"|\b_(?P<em_alt>[^_]+?)_\b",
        ))
        .ok()
    });

    let Some(re) = re else {
        return vec![Inline::Text(text.to_string())];
    };

    let mut spans = Vec::new();
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            spans.push(Inline::Text(text[last..whole.start()].to_string()));
        }
        let span = if let Some(m) = caps.name("strong") {
            Inline::Strong(m.as_str().to_string())
        } else if let Some(m) = caps.name("code") {
            Inline::Code(m.as_str().to_string())
        } else if let (Some(t), Some(u)) = (caps.name("link_text"), caps.name("url")) {
            Inline::Link {
                text: t.as_str().to_string(),
                url: u.as_str().to_string(),
            }
        } else if let Some(m) = caps.name("em").or_else(|| caps.name("em_alt")) {
            Inline::Emphasis(m.as_str().to_string())
        } else {
            Inline::Text(whole.as_str().to_string())
        };
        spans.push(span);
        last = whole.end();
    }
    if last < text.len() {
        spans.push(Inline::Text(text[last..].to_string()));
    }
    spans
}

/// Flatten inline spans back to their visible text
pub fn inline_text(spans: &[Inline]) -> String {
    spans
        .iter()
        .map(|span| match span {
            Inline::Text(s) | Inline::Strong(s) | Inline::Emphasis(s) | Inline::Code(s) => {
                s.as_str()
            }
            Inline::Link { text, .. } => text.as_str(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeMode {
    Fenced,
    Implicit,
}

struct OpenCode {
    mode: CodeMode,
    language: Option<String>,
    lines: Vec<String>,
}

struct FormatState {
    options: FormatOptions,
    segments: Vec<Segment>,
    code: Option<OpenCode>,
    list: Option<(ListKind, Vec<Vec<Inline>>)>,
    paragraph: Vec<String>,
}

impl FormatState {
    fn new(options: FormatOptions) -> Self {
        Self {
            options,
            segments: Vec::new(),
            code: None,
            list: None,
            paragraph: Vec::new(),
        }
    }

    fn push_line(&mut self, line: &str) {
        if let Some(mode) = self.code.as_ref().map(|c| c.mode) {
            self.push_code_line(mode, line);
            return;
        }

        if let Some(language) = fence_language(line) {
            self.flush_text();
            self.open_code(CodeMode::Fenced, language, None);
            return;
        }

        if self.options.implicit_code_blocks {
            if let Some(language) = sentinel_language(line) {
                self.flush_text();
                self.open_code(CodeMode::Implicit, Some(language.to_string()), Some(line));
                return;
            }
        }

        if line.trim().is_empty() {
            self.flush_list();
            if !self.paragraph.is_empty() {
                self.paragraph.push(String::new());
            }
            return;
        }

        if let Some((level, text)) = parse_heading(line) {
            self.flush_text();
            self.segments.push(Segment::Heading {
                level,
                text: format_inline(text),
            });
            return;
        }

        if let Some((kind, text)) = parse_list_item(line) {
            self.flush_paragraph();
            match &mut self.list {
                Some((open_kind, items)) if *open_kind == kind => items.push(format_inline(text)),
                _ => {
                    self.flush_list();
                    self.list = Some((kind, vec![format_inline(text)]));
                }
            }
            return;
        }

        self.flush_list();
        self.paragraph.push(line.to_string());
    }

    fn push_code_line(&mut self, mode: CodeMode, line: &str) {
        match mode {
            CodeMode::Fenced => {
                if is_fence(line) {
                    self.flush_code();
                } else if let Some(code) = &mut self.code {
                    code.lines.push(clean_code_line(line));
                }
            }
            CodeMode::Implicit => {
                if line.trim().is_empty() {
                    self.flush_code();
                } else if let Some(language) = fence_language(line) {
                    self.flush_code();
                    self.open_code(CodeMode::Fenced, language, None);
                } else if let Some(language) = sentinel_language(line) {
                    self.flush_code();
                    self.open_code(CodeMode::Implicit, Some(language.to_string()), Some(line));
                } else if let Some(code) = &mut self.code {
                    code.lines.push(clean_code_line(line));
                }
            }
        }
    }

    fn open_code(&mut self, mode: CodeMode, language: Option<String>, first_line: Option<&str>) {
        self.code = Some(OpenCode {
            mode,
            language,
            lines: first_line.map(clean_code_line).into_iter().collect(),
        });
    }

    fn flush_code(&mut self) {
        if let Some(code) = self.code.take() {
            self.segments.push(Segment::CodeBlock {
                language: code.language,
                lines: code.lines,
            });
        }
    }

    fn flush_list(&mut self) {
        if let Some((kind, items)) = self.list.take() {
            self.segments.push(Segment::List { kind, items });
        }
    }

    fn flush_paragraph(&mut self) {
        let lines = std::mem::take(&mut self.paragraph);
        let start = lines.iter().position(|l| !l.trim().is_empty());
        let end = lines.iter().rposition(|l| !l.trim().is_empty());
        if let (Some(start), Some(end)) = (start, end) {
            let text = lines[start..=end].join("\n");
            self.segments.push(Segment::Paragraph(format_inline(&text)));
        }
    }

    fn flush_text(&mut self) {
        self.flush_paragraph();
        self.flush_list();
    }

    fn finish(mut self) -> Vec<Segment> {
        self.flush_text();
        self.flush_code();
        self.segments
    }
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with(FENCE)
}

/// `Some(tag)` when the line opens a fence; the tag is `None` when absent
fn fence_language(line: &str) -> Option<Option<String>> {
    let rest = line.trim_start().strip_prefix(FENCE)?;
    Some(rest.split_whitespace().next().map(str::to_string))
}

fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let line = line.trim_start();
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if !(1..=3).contains(&hashes) {
        return None;
    }
    let text = line[hashes..].strip_prefix(' ')?.trim();
    if text.is_empty() {
        return None;
    }
    Some((hashes as u8, text))
}

fn parse_list_item(line: &str) -> Option<(ListKind, &str)> {
    let line = line.trim_start();
    if let Some(text) = line.strip_prefix("- ") {
        let text = text.trim();
        return (!text.is_empty()).then_some((ListKind::Unordered, text));
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let text = line[digits..].strip_prefix(". ")?.trim();
    (!text.is_empty()).then_some((ListKind::Ordered, text))
}

fn clean_code_line(line: &str) -> String {
    line.chars().filter(|c| *c == '\t' || !c.is_control()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(content: &str) -> Vec<Segment> {
        format(content, &FormatOptions::default())
    }

    fn text(s: &str) -> Vec<Inline> {
        vec![Inline::Text(s.to_string())]
    }

    #[test]
    fn test_plain_text_is_one_paragraph() {
        let input = "Hello **there**, see `ls` and [docs](https://example.com).";
        assert_eq!(fmt(input), vec![Segment::Paragraph(format_inline(input))]);
    }

    #[test]
    fn test_prose_lines_stay_in_one_paragraph() {
        let segments = fmt("first line\n\nsecond line\n");
        assert_eq!(segments, vec![Segment::Paragraph(text("first line\n\nsecond line"))]);
    }

    #[test]
    fn test_fenced_block_with_language() {
        assert_eq!(
            fmt("```python\nx=1\n```"),
            vec![Segment::CodeBlock {
                language: Some("python".to_string()),
                lines: vec!["x=1".to_string()],
            }]
        );
    }

    #[test]
    fn test_list_kind_change_closes_list() {
        assert_eq!(
            fmt("- a\n- b\n1. c"),
            vec![
                Segment::List {
                    kind: ListKind::Unordered,
                    items: vec![text("a"), text("b")],
                },
                Segment::List {
                    kind: ListKind::Ordered,
                    items: vec![text("c")],
                },
            ]
        );
    }

    #[test]
    fn test_headings_levels_one_to_three() {
        let segments = fmt("# One\n## Two\n### Three\n#### Four");
        assert_eq!(
            segments,
            vec![
                Segment::Heading { level: 1, text: text("One") },
                Segment::Heading { level: 2, text: text("Two") },
                Segment::Heading { level: 3, text: text("Three") },
                Segment::Paragraph(text("#### Four")),
            ]
        );
    }

    #[test]
    fn test_sentinel_opens_implicit_block_until_blank_line() {
        let segments = fmt("Bash ❯\nls -la\ntotal 0\n\nDone.");
        assert_eq!(
            segments,
            vec![
                Segment::CodeBlock {
                    language: Some("bash".to_string()),
                    lines: vec!["Bash ❯".to_string(), "ls -la".to_string(), "total 0".to_string()],
                },
                Segment::Paragraph(text("Done.")),
            ]
        );
    }

    #[test]
    fn test_interpreter_sentinel_is_python() {
        let segments = fmt("🤖 Running it\n❯ Code:\nprint(1)");
        assert_eq!(
            segments,
            vec![
                Segment::Paragraph(text("🤖 Running it")),
                Segment::CodeBlock {
                    language: Some("python".to_string()),
                    lines: vec!["❯ Code:".to_string(), "print(1)".to_string()],
                },
            ]
        );
    }

    #[test]
    fn test_sentinel_inside_fence_is_code() {
        let segments = fmt("```\nBash ❯\necho hi\n```");
        assert_eq!(
            segments,
            vec![Segment::CodeBlock {
                language: None,
                lines: vec!["Bash ❯".to_string(), "echo hi".to_string()],
            }]
        );
    }

    #[test]
    fn test_sentinel_is_prose_when_implicit_blocks_disabled() {
        let options = FormatOptions {
            implicit_code_blocks: false,
        };
        let segments = format("Bash ❯\nls", &options);
        assert_eq!(segments, vec![Segment::Paragraph(text("Bash ❯\nls"))]);
    }

    #[test]
    fn test_unterminated_fence_is_closed() {
        let segments = fmt("Look:\n```rust\nfn main() {}");
        assert_eq!(
            segments,
            vec![
                Segment::Paragraph(text("Look:")),
                Segment::CodeBlock {
                    language: Some("rust".to_string()),
                    lines: vec!["fn main() {}".to_string()],
                },
            ]
        );
    }

    #[test]
    fn test_code_lines_are_not_inline_formatted() {
        let segments = fmt("```\n**not bold** `x`\n```");
        assert_eq!(
            segments,
            vec![Segment::CodeBlock {
                language: None,
                lines: vec!["**not bold** `x`".to_string()],
            }]
        );
    }

    #[test]
    fn test_empty_input_has_no_segments() {
        assert!(fmt("").is_empty());
        assert!(fmt("  \n\n ").is_empty());
    }

    #[test]
    fn test_malformed_markers_degrade_to_prose() {
        let segments = fmt("#nospace\n-dash\n3.no space\n**unclosed");
        assert_eq!(segments.len(), 1);
        assert!(matches!(segments[0], Segment::Paragraph(_)));
    }

    #[test]
    fn test_inline_spans() {
        assert_eq!(
            format_inline("a **b** *c* _d_ `e` [f](http://g)"),
            vec![
                Inline::Text("a ".to_string()),
                Inline::Strong("b".to_string()),
                Inline::Text(" ".to_string()),
                Inline::Emphasis("c".to_string()),
                Inline::Text(" ".to_string()),
                Inline::Emphasis("d".to_string()),
                Inline::Text(" ".to_string()),
                Inline::Code("e".to_string()),
                Inline::Text(" ".to_string()),
                Inline::Link {
                    text: "f".to_string(),
                    url: "http://g".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_link_url_keeps_balanced_parens() {
        assert_eq!(
            format_inline("[Rust](https://en.wikipedia.org/wiki/Rust_(language)) ok"),
            vec![
                Inline::Link {
                    text: "Rust".to_string(),
                    url: "https://en.wikipedia.org/wiki/Rust_(language)".to_string(),
                },
                Inline::Text(" ok".to_string()),
            ]
        );
    }

    #[test]
    fn test_snake_case_is_not_emphasis() {
        assert_eq!(format_inline("call my_func_name now"), text("call my_func_name now"));
    }

    #[test]
    fn test_terminal_codes_are_stripped() {
        let segments = fmt("\x1b[32mok\x1b[0m");
        assert_eq!(segments, vec![Segment::Paragraph(text("ok"))]);
    }

    #[test]
    fn test_fence_inside_implicit_block_opens_fenced_block() {
        let segments = fmt("Bash ❯\nls\n```python\nprint(1)\n```\nafter");
        assert_eq!(
            segments,
            vec![
                Segment::CodeBlock {
                    language: Some("bash".to_string()),
                    lines: vec!["Bash ❯".to_string(), "ls".to_string()],
                },
                Segment::CodeBlock {
                    language: Some("python".to_string()),
                    lines: vec!["print(1)".to_string()],
                },
                Segment::Paragraph(text("after")),
            ]
        );
    }

    #[test]
    fn test_second_sentinel_starts_new_implicit_block() {
        let segments = fmt("Bash ❯ ls\nfile.txt\nIPython ❯ x = 1");
        assert_eq!(
            segments,
            vec![
                Segment::CodeBlock {
                    language: Some("bash".to_string()),
                    lines: vec!["Bash ❯ ls".to_string(), "file.txt".to_string()],
                },
                Segment::CodeBlock {
                    language: Some("python".to_string()),
                    lines: vec!["IPython ❯ x = 1".to_string()],
                },
            ]
        );
    }

    #[test]
    fn test_blank_line_closes_list() {
        let segments = fmt("- a\n\n- b");
        assert_eq!(segments.len(), 2);
    }
}
