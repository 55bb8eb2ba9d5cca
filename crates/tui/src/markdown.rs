//! Markdown-subset rendering for chat bubbles.
//!
//! Rendering is an ordered chain of transforms: fenced code blocks are
//! carved out first, then each prose line is classified by the line rules
//! (rule order matters: horizontal rule before bullet, heading before
//! paragraph), then inline spans are resolved with inline code taking
//! precedence over emphasis.

use ratatui::prelude::*;
use regex::Regex;
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use crate::theme::{Theme, ThemeMode};

#[derive(Debug, PartialEq)]
pub enum Segment<'a> {
    Prose(&'a str),
    CodeBlock {
        lang: Option<&'a str>,
        code: String,
    },
}

/// Split text into alternating prose and fenced-code segments. A fence that
/// is never closed swallows the rest of the text as code.
pub fn parse_segments(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut prose_start = 0;
    let mut lines = text.split_inclusive('\n');
    let mut offset = 0;

    while let Some(line) = lines.next() {
        let line_start = offset;
        offset += line.len();

        let trimmed = line.trim_end();
        if !trimmed.starts_with("```") {
            continue;
        }

        if line_start > prose_start {
            segments.push(Segment::Prose(&text[prose_start..line_start]));
        }

        let lang_tag = trimmed.trim_start_matches('`').trim();
        let lang = if lang_tag.is_empty() { None } else { Some(lang_tag) };

        let mut code = String::new();
        let mut closed = false;
        for code_line in lines.by_ref() {
            offset += code_line.len();
            if code_line.trim_end().trim_start_matches(' ') == "```" {
                closed = true;
                break;
            }
            code.push_str(code_line);
        }
        let code = code.strip_suffix('\n').unwrap_or(&code).to_string();
        segments.push(Segment::CodeBlock { lang, code });
        prose_start = offset;

        if !closed {
            break;
        }
    }

    if prose_start < text.len() {
        segments.push(Segment::Prose(&text[prose_start..]));
    }
    segments
}

struct LineRules {
    heading: Regex,
    rule: Regex,
    quote: Regex,
    bullet: Regex,
    ordered: Regex,
}

impl LineRules {
    fn new() -> Self {
        Self {
            heading: Regex::new(r"^(#{1,4})\s+(.*)$").expect("static regex"),
            rule: Regex::new(r"^\s*-{3,}\s*$").expect("static regex"),
            quote: Regex::new(r"^>\s?(.*)$").expect("static regex"),
            bullet: Regex::new(r"^(\s*)[-*]\s+(.*)$").expect("static regex"),
            ordered: Regex::new(r"^\s*(\d+)\.\s+(.*)$").expect("static regex"),
        }
    }
}

pub struct MarkdownRenderer {
    ps: SyntaxSet,
    ts: ThemeSet,
    rules: LineRules,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            ps: SyntaxSet::load_defaults_newlines(),
            ts: ThemeSet::load_defaults(),
            rules: LineRules::new(),
        }
    }

    pub fn render(&self, text: &str, theme: &Theme) -> Vec<Line<'static>> {
        let mut out = Vec::new();

        for segment in parse_segments(text) {
            match segment {
                Segment::Prose(prose) => {
                    for line in prose.lines() {
                        out.push(self.render_prose_line(line, theme));
                    }
                }
                Segment::CodeBlock { lang, code } => {
                    out.push(Line::from(vec![
                        Span::raw("  "),
                        Span::styled(
                            format!(" {} ", lang.unwrap_or("text")),
                            Style::default()
                                .fg(theme.text_secondary)
                                .bg(theme.bg_elevated)
                                .bold(),
                        ),
                    ]));
                    out.extend(self.highlight_block(&code, lang, theme));
                }
            }
        }
        out
    }

    // Line rules, in order. The horizontal rule must run before the bullet
    // rule so "---" never reads as a list item.
    fn render_prose_line(&self, raw: &str, theme: &Theme) -> Line<'static> {
        let line = raw.trim_end();

        if let Some(caps) = self.rules.heading.captures(line) {
            return Line::from(Span::styled(
                format!("  {}", &caps[2]),
                Style::default().fg(theme.accent).bold(),
            ));
        }

        if self.rules.rule.is_match(line) {
            return Line::from(Span::styled(
                "  ────────".to_string(),
                Style::default().fg(theme.border_default),
            ));
        }

        if let Some(caps) = self.rules.quote.captures(line) {
            let mut spans = vec![Span::styled(
                "  ┃ ".to_string(),
                Style::default().fg(theme.accent),
            )];
            spans.extend(inline_spans(&caps[1], theme.text_secondary, theme));
            return Line::from(spans);
        }

        if let Some(caps) = self.rules.bullet.captures(line) {
            let indent = if caps[1].len() > 2 { "    " } else { "  " };
            let mut spans = vec![Span::styled(
                format!("{indent}• "),
                Style::default().fg(theme.accent),
            )];
            spans.extend(inline_spans(&caps[2], theme.text_primary, theme));
            return Line::from(spans);
        }

        if let Some(caps) = self.rules.ordered.captures(line) {
            let mut spans = vec![Span::styled(
                format!("  {}. ", &caps[1]),
                Style::default().fg(theme.accent),
            )];
            spans.extend(inline_spans(&caps[2], theme.text_primary, theme));
            return Line::from(spans);
        }

        let mut spans = vec![Span::raw("  ")];
        spans.extend(inline_spans(line, theme.text_primary, theme));
        Line::from(spans)
    }

    fn highlight_block(&self, code: &str, lang: Option<&str>, theme: &Theme) -> Vec<Line<'static>> {
        let syntax = lang
            .and_then(|l| self.ps.find_syntax_by_token(l))
            .unwrap_or_else(|| self.ps.find_syntax_plain_text());

        let theme_name = match theme.mode {
            ThemeMode::Dark => "base16-ocean.dark",
            ThemeMode::Light => "base16-ocean.light",
        };
        let mut h = HighlightLines::new(syntax, &self.ts.themes[theme_name]);

        let mut out = Vec::new();
        for line_text in LinesWithEndings::from(code) {
            let mut spans: Vec<Span<'static>> = vec![Span::raw("  ")];
            match h.highlight_line(line_text, &self.ps) {
                Ok(ranges) => {
                    for segment in ranges {
                        if let Ok(span) = syntect_tui::into_span(segment) {
                            spans.push(Span::styled(
                                span.content.trim_end_matches('\n').to_string(),
                                span.style.bg(theme.bg_elevated),
                            ));
                        }
                    }
                }
                Err(_) => {
                    spans.push(Span::styled(
                        line_text.trim_end_matches('\n').to_string(),
                        Style::default().fg(theme.text_secondary),
                    ));
                }
            }
            out.push(Line::from(spans));
        }
        out
    }
}

/// Inline span resolution. Precedence is fixed: inline code first, then
/// bold-italic, bold, italic. Emphasis markers inside a code span are
/// literal.
fn inline_spans(text: &str, base_fg: Color, theme: &Theme) -> Vec<Span<'static>> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut spans = Vec::new();
    let mut buf = String::new();
    let mut i = 0;

    let mut flush = |buf: &mut String, spans: &mut Vec<Span<'static>>| {
        if !buf.is_empty() {
            spans.push(Span::styled(
                std::mem::take(buf),
                Style::default().fg(base_fg),
            ));
        }
    };

    while i < len {
        if chars[i] == '`' {
            if let Some(end) = find_char(&chars, i + 1, '`') {
                flush(&mut buf, &mut spans);
                let code: String = chars[i + 1..end].iter().collect();
                spans.push(Span::styled(
                    code,
                    Style::default().fg(theme.accent).bg(theme.bg_elevated),
                ));
                i = end + 1;
                continue;
            }
        } else if starts_run(&chars, i, 3) {
            if let Some(end) = find_run(&chars, i + 3, 3) {
                flush(&mut buf, &mut spans);
                let inner: String = chars[i + 3..end].iter().collect();
                spans.push(Span::styled(
                    inner,
                    Style::default().fg(base_fg).bold().italic(),
                ));
                i = end + 3;
                continue;
            }
        } else if starts_run(&chars, i, 2) {
            if let Some(end) = find_run(&chars, i + 2, 2) {
                flush(&mut buf, &mut spans);
                let inner: String = chars[i + 2..end].iter().collect();
                spans.push(Span::styled(inner, Style::default().fg(base_fg).bold()));
                i = end + 2;
                continue;
            }
        } else if chars[i] == '*' {
            if let Some(end) = find_char(&chars, i + 1, '*') {
                flush(&mut buf, &mut spans);
                let inner: String = chars[i + 1..end].iter().collect();
                spans.push(Span::styled(inner, Style::default().fg(base_fg).italic()));
                i = end + 1;
                continue;
            }
        }
        buf.push(chars[i]);
        i += 1;
    }

    flush(&mut buf, &mut spans);
    spans
}

fn starts_run(chars: &[char], at: usize, run: usize) -> bool {
    chars.len() >= at + run && chars[at..at + run].iter().all(|&c| c == '*')
}

fn find_char(chars: &[char], from: usize, needle: char) -> Option<usize> {
    (from..chars.len()).find(|&i| chars[i] == needle)
}

fn find_run(chars: &[char], from: usize, run: usize) -> Option<usize> {
    (from..chars.len().saturating_sub(run - 1)).find(|&i| chars[i..i + run].iter().all(|&c| c == '*'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(spans: &[Span<'static>]) -> String {
        spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn segments_without_fences_are_one_prose_block() {
        let segs = parse_segments("hello\nworld");
        assert_eq!(segs, vec![Segment::Prose("hello\nworld")]);
    }

    #[test]
    fn fenced_block_with_language() {
        let segs = parse_segments("before\n```rust\nfn main() {}\n```\nafter");
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0], Segment::Prose("before\n"));
        assert_eq!(
            segs[1],
            Segment::CodeBlock {
                lang: Some("rust"),
                code: "fn main() {}".to_string(),
            }
        );
        assert_eq!(segs[2], Segment::Prose("after"));
    }

    #[test]
    fn unclosed_fence_takes_the_rest() {
        let segs = parse_segments("```\nstill code");
        assert_eq!(
            segs,
            vec![Segment::CodeBlock {
                lang: None,
                code: "still code".to_string(),
            }]
        );
    }

    #[test]
    fn inline_code_shields_emphasis_markers() {
        let theme = Theme::dark();
        let spans = inline_spans("use `**argv**` here", theme.text_primary, &theme);
        // The code span keeps its asterisks; nothing inside it was bolded.
        assert!(spans.iter().any(|s| s.content == "**argv**"));
        assert_eq!(flat(&spans), "use **argv** here");
    }

    #[test]
    fn bold_italic_takes_precedence_over_bold() {
        let theme = Theme::dark();
        let spans = inline_spans("***both*** and **bold** and *it*", theme.text_primary, &theme);
        assert_eq!(flat(&spans), "both and bold and it");
        let both = spans.iter().find(|s| s.content == "both").unwrap();
        assert!(both.style.add_modifier.contains(Modifier::BOLD));
        assert!(both.style.add_modifier.contains(Modifier::ITALIC));
        let bold = spans.iter().find(|s| s.content == "bold").unwrap();
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
        assert!(!bold.style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn unterminated_markers_stay_literal() {
        let theme = Theme::dark();
        let spans = inline_spans("2 * 3 is six", theme.text_primary, &theme);
        assert_eq!(flat(&spans), "2 * 3 is six");
    }

    #[test]
    fn horizontal_rule_is_not_a_bullet() {
        let renderer = MarkdownRenderer::new();
        let theme = Theme::dark();
        let line = renderer.render_prose_line("---", &theme);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(!text.contains('•'));
        assert!(text.contains('─'));
    }

    #[test]
    fn headings_and_bullets_classify() {
        let renderer = MarkdownRenderer::new();
        let theme = Theme::dark();

        let h = renderer.render_prose_line("### 2. Learning Roadmap", &theme);
        let text: String = h.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text.trim(), "2. Learning Roadmap");

        let b = renderer.render_prose_line("- ✅ **Level 1: Basics**", &theme);
        let text: String = b.spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(text.contains('•'));
        assert!(text.contains("Level 1: Basics"));
    }

    #[test]
    fn render_covers_mixed_document() {
        let renderer = MarkdownRenderer::new();
        let theme = Theme::dark();
        let lines = renderer.render(
            "# Title\nplain *text*\n```rust\nlet x = 1;\n```\n> quoted",
            &theme,
        );
        // Title, prose, fence label, one code line, quote.
        assert_eq!(lines.len(), 5);
    }
}
