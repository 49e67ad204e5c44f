//! Markdown to styled terminal lines
//!
//! Soft breaks fold into spaces; wrapping happens later against the actual
//! transcript width.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

#[derive(Clone, Copy)]
struct ListState {
    ordered: bool,
    next: u64,
}

fn code_style() -> Style {
    Style::default().fg(Color::Yellow)
}

fn muted() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn heading_style(level: HeadingLevel, base: Style) -> Style {
    let style = base.fg(Color::Cyan).add_modifier(Modifier::BOLD);
    match level {
        HeadingLevel::H1 => style.add_modifier(Modifier::UNDERLINED),
        _ => style,
    }
}

fn current_style(styles: &[Style]) -> Style {
    styles.last().copied().unwrap_or_default()
}

fn pop_style(styles: &mut Vec<Style>) {
    if styles.len() > 1 {
        styles.pop();
    }
}

fn line_is_blank(line: &Line<'_>) -> bool {
    line.spans.iter().all(|s| s.content.trim().is_empty())
}

fn flush_line(lines: &mut Vec<Line<'static>>, current: &mut Vec<Span<'static>>) {
    if !current.is_empty() {
        lines.push(Line::from(std::mem::take(current)));
    }
}

fn push_blank_line(lines: &mut Vec<Line<'static>>) {
    if lines.last().is_some_and(|l| !line_is_blank(l)) {
        lines.push(Line::default());
    }
}

fn ensure_prefix(current: &mut Vec<Span<'static>>, quote_depth: usize) {
    if current.is_empty() && quote_depth > 0 {
        current.push(Span::styled("│ ".repeat(quote_depth), muted()));
    }
}

/// Render markdown source as styled lines, emphasis markers consumed
#[allow(clippy::too_many_lines)]
pub fn markdown_lines(text: &str, base: Style) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut styles = vec![base];
    let mut list_stack: Vec<ListState> = Vec::new();
    let mut quote_depth = 0usize;
    let mut link_urls: Vec<String> = Vec::new();
    let mut code_block: Option<String> = None;

    for event in Parser::new_ext(text, options) {
        if code_block.is_some() {
            match event {
                Event::Text(text) => {
                    if let Some(code) = code_block.as_mut() {
                        code.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    let code = code_block.take().unwrap_or_default();
                    for row in code.lines() {
                        ensure_prefix(&mut current, quote_depth);
                        current.push(Span::styled(format!("  {row}"), code_style()));
                        flush_line(&mut lines, &mut current);
                    }
                    push_blank_line(&mut lines);
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(tag) => match tag {
                Tag::Heading { level, .. } => {
                    flush_line(&mut lines, &mut current);
                    styles.push(heading_style(level, current_style(&styles)));
                }
                Tag::BlockQuote(_) => {
                    flush_line(&mut lines, &mut current);
                    quote_depth += 1;
                }
                Tag::CodeBlock(_) => {
                    flush_line(&mut lines, &mut current);
                    code_block = Some(String::new());
                }
                Tag::List(start) => {
                    flush_line(&mut lines, &mut current);
                    list_stack.push(ListState {
                        ordered: start.is_some(),
                        next: start.unwrap_or(1),
                    });
                }
                Tag::Item => {
                    flush_line(&mut lines, &mut current);
                    ensure_prefix(&mut current, quote_depth);
                    let indent = "  ".repeat(list_stack.len().saturating_sub(1));
                    let marker = match list_stack.last_mut() {
                        Some(state) if state.ordered => {
                            let marker = format!("{indent}{}. ", state.next);
                            state.next += 1;
                            marker
                        }
                        _ => format!("{indent}• "),
                    };
                    current.push(Span::styled(marker, base.fg(Color::Cyan)));
                }
                Tag::Emphasis => {
                    styles.push(current_style(&styles).add_modifier(Modifier::ITALIC));
                }
                Tag::Strong | Tag::TableHead => {
                    styles.push(current_style(&styles).add_modifier(Modifier::BOLD));
                }
                Tag::Strikethrough => {
                    styles.push(current_style(&styles).add_modifier(Modifier::CROSSED_OUT));
                }
                Tag::Link { dest_url, .. } => {
                    link_urls.push(dest_url.to_string());
                    styles.push(current_style(&styles).add_modifier(Modifier::UNDERLINED));
                }
                Tag::TableCell => {
                    ensure_prefix(&mut current, quote_depth);
                    if current.iter().any(|s| !s.content.starts_with('│')) {
                        current.push(Span::styled(" │ ", muted()));
                    }
                }
                _ => {}
            },
            Event::End(end) => match end {
                TagEnd::Paragraph => {
                    flush_line(&mut lines, &mut current);
                    if list_stack.is_empty() {
                        push_blank_line(&mut lines);
                    }
                }
                TagEnd::Heading(_) => {
                    pop_style(&mut styles);
                    flush_line(&mut lines, &mut current);
                    push_blank_line(&mut lines);
                }
                TagEnd::BlockQuote(_) => {
                    flush_line(&mut lines, &mut current);
                    quote_depth = quote_depth.saturating_sub(1);
                    push_blank_line(&mut lines);
                }
                TagEnd::List(_) => {
                    flush_line(&mut lines, &mut current);
                    list_stack.pop();
                    if list_stack.is_empty() {
                        push_blank_line(&mut lines);
                    }
                }
                TagEnd::Item | TagEnd::TableRow => flush_line(&mut lines, &mut current),
                TagEnd::TableHead => {
                    pop_style(&mut styles);
                    flush_line(&mut lines, &mut current);
                }
                TagEnd::Table => {
                    flush_line(&mut lines, &mut current);
                    push_blank_line(&mut lines);
                }
                TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                    pop_style(&mut styles);
                }
                TagEnd::Link => {
                    pop_style(&mut styles);
                    if let Some(url) = link_urls.pop() {
                        current.push(Span::styled(format!(" ({url})"), muted()));
                    }
                }
                _ => {}
            },
            Event::Text(text) => {
                ensure_prefix(&mut current, quote_depth);
                current.push(Span::styled(text.to_string(), current_style(&styles)));
            }
            Event::Code(text) => {
                ensure_prefix(&mut current, quote_depth);
                current.push(Span::styled(text.to_string(), code_style()));
            }
            Event::SoftBreak => current.push(Span::styled(" ", current_style(&styles))),
            Event::HardBreak => flush_line(&mut lines, &mut current),
            Event::Rule => {
                flush_line(&mut lines, &mut current);
                lines.push(Line::from(Span::styled("─".repeat(24), muted())));
                push_blank_line(&mut lines);
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                ensure_prefix(&mut current, quote_depth);
                current.push(Span::styled(html.trim_end().to_string(), muted()));
            }
            _ => {}
        }
    }

    flush_line(&mut lines, &mut current);
    while lines.last().is_some_and(line_is_blank) {
        lines.pop();
    }
    lines
}
