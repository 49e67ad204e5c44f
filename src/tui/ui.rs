//! Drawing
//!
//! The transcript is flattened to styled lines, markdown included, and
//! wrapped here so the scroll offset can be computed from the bottom.

use super::markdown::markdown_lines;
use super::{App, Focus};
use crate::council::Stage;
use crate::render::{
    ConversationView, MessageView, Stage1View, Stage2View, Stage3View, StageView,
};
use crate::tui::composer::Composer;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

const SIDEBAR_WIDTH: u16 = 34;

fn styled(text: impl Into<String>, style: Style) -> Line<'static> {
    Line::from(Span::styled(text.into(), style))
}

fn plain(text: impl Into<String>) -> Line<'static> {
    styled(text, Style::default())
}

pub fn render(f: &mut Frame, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(f.area());

    render_sidebar(f, app, columns[0]);

    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(5),
        ])
        .split(columns[1]);

    render_transcript(f, app, main[0]);
    render_status(f, app, main[1]);
    render_composer(f, app, main[2]);
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn render_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("LLM Council")
        .border_style(border_style(app.focus == Focus::Sidebar));

    if app.items.is_empty() {
        let text = vec![
            Line::from(Span::styled("n  New Conversation", Color::Cyan)),
            Line::from(""),
            Line::from(Span::styled("No conversations yet", Color::DarkGray)),
        ];
        f.render_widget(Paragraph::new(text).block(block), area);
        return;
    }

    let items: Vec<ListItem> = app
        .items
        .iter()
        .map(|item| {
            let mut title_style = Style::default();
            if item.is_current {
                title_style = title_style.add_modifier(Modifier::BOLD).fg(Color::Yellow);
            }
            let marker = if item.in_flight {
                "… "
            } else if item.unseen_activity {
                "● "
            } else {
                "  "
            };
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(marker, Color::Cyan),
                    Span::styled(item.title.clone(), title_style),
                ]),
                Line::from(Span::styled(
                    format!("  {}", item.meta()),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default().with_selected(Some(app.cursor));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_transcript(f: &mut Frame, app: &App, area: Rect) {
    let title = app
        .view
        .as_ref()
        .map_or_else(|| "LLM Council".to_string(), |v| v.title.clone());
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = transcript_rows(app.view.as_ref());
    let lines = wrap_rows(&rows, usize::from(inner.width.max(1)));
    let total = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    let offset = total
        .saturating_sub(inner.height)
        .saturating_sub(app.scroll_back);

    f.render_widget(Paragraph::new(lines).scroll((offset, 0)), inner);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let line = match &app.status {
        Some(status) => Line::from(Span::styled(status.clone(), Color::Red)),
        None => Line::from(Span::styled(
            "Tab focus · Enter send · Shift+Enter newline · n new · r refresh · Ctrl+C quit",
            Color::DarkGray,
        )),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn render_composer(f: &mut Frame, app: &App, area: Rect) {
    let busy = app.busy();
    let has_messages = app.view.as_ref().is_some_and(|v| !v.is_empty);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(if busy { "Waiting for the council" } else { "Message" })
        .border_style(border_style(app.focus == Focus::Composer));

    let paragraph = if app.composer.text().is_empty() {
        Paragraph::new(Span::styled(
            Composer::placeholder(has_messages),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Paragraph::new(app.composer.text().to_string())
    };
    f.render_widget(paragraph.block(block).wrap(Wrap { trim: false }), area);
}

// ============================================================================
// Transcript
// ============================================================================

fn heading() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn push_markdown(rows: &mut Vec<Line<'static>>, markdown: &str) {
    rows.extend(markdown_lines(markdown, Style::default()));
}

/// Flatten a conversation to unwrapped lines, top to bottom
pub fn transcript_rows(view: Option<&ConversationView>) -> Vec<Line<'static>> {
    let mut rows = Vec::new();
    let Some(view) = view.filter(|v| !v.is_empty) else {
        rows.push(styled("LLM Council", heading().fg(Color::Cyan)));
        rows.push(Line::default());
        rows.push(styled(Composer::placeholder(false), dim()));
        return rows;
    };

    for message in &view.messages {
        match message {
            MessageView::User { content } => {
                rows.push(styled("You", heading().fg(Color::Green)));
                push_markdown(&mut rows, &content.markdown);
            }
            MessageView::Assistant(turn) => {
                rows.push(styled("LLM Council", heading().fg(Color::Cyan)));
                push_stage(&mut rows, &turn.stage1, push_stage1);
                push_stage(&mut rows, &turn.stage2, push_stage2);
                push_stage(&mut rows, &turn.stage3, push_stage3);
            }
        }
        rows.push(Line::default());
    }

    if let Some(caption) = view.caption {
        rows.push(styled(caption, dim().add_modifier(Modifier::ITALIC)));
    }
    rows
}

fn push_stage<T>(
    rows: &mut Vec<Line<'static>>,
    stage: &StageView<T>,
    push: fn(&mut Vec<Line<'static>>, &T),
) {
    match stage {
        StageView::Hidden => {}
        StageView::Loading { caption } => {
            rows.push(styled(format!("⠿ {caption}"), Style::default().fg(Color::Yellow)));
        }
        StageView::Ready { content } => push(rows, content),
        StageView::Failed { message } => {
            rows.push(styled(format!("✗ {message}"), Style::default().fg(Color::Red)));
        }
    }
}

fn push_stage1(rows: &mut Vec<Line<'static>>, view: &Stage1View) {
    rows.push(styled(Stage::Responses.title(), heading()));
    for card in &view.cards {
        rows.push(styled(format!("[{}]", card.tab), Style::default().fg(Color::Magenta)));
        push_markdown(rows, &card.content.markdown);
    }
}

fn push_stage2(rows: &mut Vec<Line<'static>>, view: &Stage2View) {
    rows.push(styled(Stage::Rankings.title(), heading()));
    for evaluation in &view.evaluations {
        rows.push(styled(
            format!("[{}]", evaluation.tab),
            Style::default().fg(Color::Magenta),
        ));
        push_markdown(rows, &evaluation.text.markdown);
        if !evaluation.parsed_ranking.is_empty() {
            rows.push(styled("Extracted Ranking:", dim()));
            for (i, entry) in evaluation.parsed_ranking.iter().enumerate() {
                rows.push(plain(format!("{}. {}", i + 1, entry.model)));
            }
        }
    }
    if !view.aggregate.is_empty() {
        rows.push(styled("Aggregate Rankings (Street Cred)", heading()));
        for row in &view.aggregate {
            rows.push(plain(format!(
                "#{} {}  {} {}",
                row.position,
                row.short_name,
                row.average_caption(),
                row.votes_caption()
            )));
        }
    }
}

fn push_stage3(rows: &mut Vec<Line<'static>>, view: &Stage3View) {
    let title = match &view.chairman {
        Some(chairman) => format!("{} (Chairman: {chairman})", Stage::Synthesis.title()),
        None => Stage::Synthesis.title().to_string(),
    };
    rows.push(styled(title, heading()));
    push_markdown(rows, &view.answer.markdown);
}

/// Word-wrap lines to `width` columns, keeping span styles. Words longer
/// than a row are split.
pub fn wrap_rows(rows: &[Line<'static>], width: usize) -> Vec<Line<'static>> {
    rows.iter().flat_map(|row| wrap_line(row, width)).collect()
}

fn push_char(spans: &mut Vec<Span<'static>>, c: char, style: Style) {
    if let Some(last) = spans.last_mut() {
        if last.style == style {
            last.content.to_mut().push(c);
            return;
        }
    }
    spans.push(Span::styled(c.to_string(), style));
}

fn wrap_line(line: &Line<'static>, width: usize) -> Vec<Line<'static>> {
    // Each word carries the style of the space in front of it
    let mut words: Vec<(Option<Style>, Vec<(char, Style)>)> = vec![(None, Vec::new())];
    for span in &line.spans {
        for c in span.content.chars() {
            if c == ' ' {
                words.push((Some(span.style), Vec::new()));
            } else if let Some((_, word)) = words.last_mut() {
                word.push((c, span.style));
            }
        }
    }

    let finish = |spans: &mut Vec<Span<'static>>| Line::from(std::mem::take(spans)).style(line.style);
    let mut out = Vec::new();
    let mut spans = Vec::new();
    let mut len = 0;
    for (space, word) in words {
        if let Some(space_style) = space {
            if len >= width || (len > 0 && len + 1 + word.len() > width) {
                out.push(finish(&mut spans));
                len = 0;
            } else {
                push_char(&mut spans, ' ', space_style);
                len += 1;
            }
        }
        for (c, style) in word {
            if len >= width {
                out.push(finish(&mut spans));
                len = 0;
            }
            push_char(&mut spans, c, style);
            len += 1;
        }
    }
    out.push(finish(&mut spans));
    out
}
