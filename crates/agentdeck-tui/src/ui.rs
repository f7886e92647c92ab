use agentdeck_core::controller::{LifecyclePhase, StatusLevel};
use agentdeck_core::render::render_message;
use agentdeck_core::state::{BackendState, ChatMessage, ChatRole};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode};
use crate::markdown::LineRenderer;
use crate::theme::Theme;

const STATUS_LOG_HEIGHT: u16 = 6;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    frame.render_widget(Block::default().style(app.theme.base()), area);

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    let staged_height = if app.chat.staged().is_empty() { 0 } else { 1 };
    let [chat_area, staged_area, input_area, log_area] = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length(staged_height),
        Constraint::Length(3),
        Constraint::Length(STATUS_LOG_HEIGHT),
    ])
    .areas(body_area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    if staged_height > 0 {
        render_staged(app, frame, staged_area);
    }
    render_input(app, frame, input_area);
    render_status_log(app, frame, log_area);
    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.confirming_restart() {
        render_restart_prompt(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn backend_badge(state: BackendState, phase: LifecyclePhase) -> Span<'static> {
    let (label, color) = match (phase, state) {
        (LifecyclePhase::Starting, _) => ("starting", Color::Yellow),
        (LifecyclePhase::Restarting, _) => ("restarting", Color::Yellow),
        (_, BackendState::Running) => ("running", Color::Green),
        (_, BackendState::Stopped) => ("stopped", Color::Red),
        (_, BackendState::Unknown) => ("unknown", Color::Gray),
    };
    Span::styled(
        format!(" backend: {label} "),
        Style::default().bg(color).fg(Color::Black).add_modifier(Modifier::BOLD),
    )
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let model = app.models.selected().unwrap_or("no model");
    let channel = if app.channel_connected { " ● live " } else { " ○ offline " };

    let title = Line::from(vec![
        Span::styled(" agentdeck ", Style::default().fg(app.theme.accent()).bold()),
        backend_badge(app.backend_state, app.lifecycle.phase()),
        Span::raw(" "),
        Span::styled(format!("model: {model}"), Style::default().fg(Color::White)),
        Span::styled(channel, Style::default().fg(Color::Gray)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Lines for one chat bubble, or nothing when the message is blank
fn message_lines(
    message: &ChatMessage,
    app: &App,
    renderer: &mut LineRenderer,
) -> Vec<Line<'static>> {
    let body = render_message(renderer, &message.content, &app.format_options);
    if body.is_none() && message.attachments.is_empty() {
        return Vec::new();
    }

    let (label, style) = match message.role {
        _ if message.error => ("Error:", app.theme.error()),
        ChatRole::User => ("You:", app.theme.user()),
        ChatRole::Assistant => ("Agent:", app.theme.assistant()),
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(label, style),
        Span::styled(
            format!(" {}", message.timestamp.with_timezone(&chrono::Local).format("%H:%M")),
            app.theme.muted(),
        ),
    ])];
    lines.extend(body.into_iter().flatten().flatten());
    for image in &message.attachments {
        lines.push(Line::from(Span::styled(
            format!("  [image: {}]", image.describe()),
            app.theme.muted(),
        )));
    }
    lines.push(Line::default());
    lines
}

/// Rows the paragraph takes once word-wrapped to `width`
fn wrapped_height(paragraph: &Paragraph<'_>, width: u16) -> u16 {
    let rows = paragraph.line_count(width.max(1));
    rows.min(u16::MAX as usize) as u16
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.theme.accent()))
        .title(" Chat ");

    let mut renderer = LineRenderer::new(app.theme);
    let mut lines: Vec<Line<'static>> = Vec::new();
    for message in app.chat.messages() {
        lines.extend(message_lines(message, app, &mut renderer));
    }

    if app.is_waiting_for_reply() {
        lines.push(Line::from(Span::styled("Agent:", app.theme.assistant())));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Working{dots}"),
            app.theme.muted().add_modifier(Modifier::ITALIC),
        )));
    }

    if lines.is_empty() {
        let hint = if app.backend_state.is_running() {
            "Press i to write a message to the agent."
        } else {
            "Backend not started. Press s to start it."
        };
        let empty = Paragraph::new(Text::from(Span::styled(hint, app.theme.muted()))).block(block);
        frame.render_widget(empty, area);
        app.chat_scroll = 0;
        return;
    }

    // Counted before the block is attached so borders are not included
    let chat = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    let max_scroll = wrapped_height(&chat, app.chat_width).saturating_sub(app.chat_height);
    if app.follow_tail || app.chat_scroll >= max_scroll {
        app.chat_scroll = max_scroll;
        app.follow_tail = true;
    }

    let chat = chat.block(block).scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_staged(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::styled(" Attached: ", app.theme.muted())];
    for (i, image) in app.chat.staged().iter().enumerate() {
        spans.push(Span::styled(
            format!("[{}] {} ", i + 1, image.describe()),
            Style::default().fg(app.theme.accent()),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let title = if app.is_waiting_for_reply() {
        " Message (waiting for reply) "
    } else {
        " Message (/image PATH, /unstage N) "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(app.theme.user().remove_modifier(Modifier::BOLD))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_status_log(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Status ");

    let visible = area.height.saturating_sub(2) as usize;
    let mut lines: Vec<Line> = app
        .log
        .entries()
        .rev()
        .take(visible)
        .map(|entry| {
            let style = match entry.level {
                StatusLevel::Info => app.theme.muted(),
                StatusLevel::Error => Style::default().fg(Color::Red),
            };
            Line::from(Span::styled(entry.display(), style))
        })
        .collect();
    lines.reverse();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let keys: Vec<(&str, &str)> = match app.input_mode {
        InputMode::Normal => vec![
            ("i", "write"),
            ("s", "start"),
            ("r", "restart"),
            ("m", "model"),
            ("c", "clear"),
            ("x", "cancel"),
            ("t", theme_hint(app.theme)),
            ("PgUp/PgDn", "scroll"),
            ("q", "quit"),
        ],
        InputMode::Editing => vec![("Enter", "send"), ("Esc", "stop editing")],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style)];
    for (key, label) in keys {
        spans.push(Span::styled(format!(" {key} "), key_style));
        spans.push(Span::styled(format!(" {label} "), label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn theme_hint(theme: Theme) -> &'static str {
    match theme {
        Theme::Dark => "light",
        Theme::Light => "dark",
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_restart_prompt(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 44, 5);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Restart backend? ");

    let text = Text::from(vec![
        Line::from("The running task will be interrupted."),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" restart   "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" keep running"),
        ]),
    ]);

    frame.render_widget(Paragraph::new(text).style(app.theme.base()).block(block), popup_area);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 48, app.models.models().len() as u16 + 2);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.theme.accent()))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    let selected = app.models.selected();
    let items: Vec<ListItem> = app
        .models
        .models()
        .iter()
        .map(|model| {
            let style = if Some(model.as_str()) == selected {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {model} ")).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .style(app.theme.base())
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}
