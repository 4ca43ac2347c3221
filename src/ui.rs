use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState,
    Wrap,
};

use crate::dashboard::{CardControls, Dashboard, FocusPane};
use crate::model::{InstanceState, WorklogEntry};
use crate::transport::SocketState;

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);
const PL_D: Color = Color::Rgb(82, 24, 124);
const SEPARATOR: &str = "\u{e0b0}";
const SEPARATOR_RTL: &str = "\u{e0b2}";

pub fn render(frame: &mut Frame, dashboard: &mut Dashboard) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], dashboard);
    render_body(frame, root[1], dashboard);
    render_footer(frame, root[2], dashboard);

    if dashboard.show_help() {
        render_help_modal(frame);
    }
}

fn render_header(frame: &mut Frame, area: Rect, dashboard: &Dashboard) {
    let total = dashboard.cards().len();
    let running = dashboard.running_count();

    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, " FLEET ", Color::Black, ACCENT, PL_A);
    push_powerline_segment(
        &mut spans,
        format!(" 󰒋 {} ", compact_text(&display_backend(dashboard.backend()), 32)),
        Color::White,
        PL_A,
        PL_B,
    );
    push_powerline_segment(
        &mut spans,
        format!(" 󰐊 {running} running "),
        Color::White,
        PL_B,
        PL_C,
    );
    push_powerline_segment(
        &mut spans,
        format!(" 󰏤 {} stopped ", total - running),
        Color::White,
        PL_C,
        BG,
    );

    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG).fg(Color::White)),
        area,
    );
}

fn render_body(frame: &mut Frame, area: Rect, dashboard: &mut Dashboard) {
    let direction = if area.width >= 100 {
        Direction::Horizontal
    } else {
        Direction::Vertical
    };
    let chunks = Layout::default()
        .direction(direction)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    dashboard.set_page_size(table_rows_visible(chunks[0]));
    let focus = dashboard.focus();
    render_instances(frame, chunks[0], dashboard, focus == FocusPane::Instances);
    render_worklog(frame, chunks[1], dashboard, focus == FocusPane::Worklog);
}

fn render_instances(frame: &mut Frame, area: Rect, dashboard: &Dashboard, focused: bool) {
    let block = pane_block(format!("Instances ({})", dashboard.cards().len()), focused);

    if dashboard.cards().is_empty() {
        let empty = Paragraph::new("No instances. Press c to create one.")
            .block(block)
            .style(Style::default().fg(MUTED));
        frame.render_widget(empty, area);
        return;
    }

    let header_row = Row::new(["ID", "STATUS", "CREATED", "ACTIONS"].map(|header| {
        Cell::from(header).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1)
    .style(Style::default().fg(ACCENT));

    let rows = dashboard.cards().iter().map(|card| {
        Row::new([
            Cell::from(card.id.clone()).style(Style::default().fg(Color::White)),
            Cell::from(card.status_text.clone()).style(status_style(card.state)),
            Cell::from(compact_timestamp(&card.created)).style(Style::default().fg(MUTED)),
            Cell::from(actions_label(card.controls)).style(Style::default().fg(Color::White)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Min(8),
            Constraint::Length(16),
            Constraint::Length(12),
            Constraint::Length(17),
        ],
    )
    .header(header_row)
    .block(block)
    .column_spacing(1)
    .row_highlight_style(
        Style::default()
            .bg(Color::Rgb(24, 36, 58))
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("󰜴 ");

    let mut state = TableState::default();
    state.select(dashboard.selected_index());
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_worklog(frame: &mut Frame, area: Rect, dashboard: &Dashboard, focused: bool) {
    let title = if dashboard.follows_worklog() {
        format!("Worklog ({})", dashboard.worklog().len())
    } else {
        format!("Worklog ({}) paused", dashboard.worklog().len())
    };
    let items = dashboard
        .worklog()
        .iter()
        .map(|entry| ListItem::new(worklog_line(entry)))
        .collect::<Vec<_>>();

    let highlight = if focused {
        Style::default()
            .bg(Color::Rgb(24, 36, 58))
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let list = List::new(items)
        .block(pane_block(title, focused))
        .highlight_style(highlight);

    let mut state = ListState::default();
    state.select(dashboard.worklog_selected_index());
    frame.render_stateful_widget(list, area, &mut state);
}

fn worklog_line(entry: &WorklogEntry) -> Line<'static> {
    let color = match entry.kind.as_deref() {
        Some("error") => ERROR,
        Some("warn" | "warning") => WARN,
        _ => Color::White,
    };
    Line::from(vec![
        Span::styled(
            format!("{} ", entry.timestamp),
            Style::default().fg(MUTED),
        ),
        Span::styled(
            format!("Server: {} ", entry.id.as_deref().unwrap_or("-")),
            Style::default().fg(ACCENT),
        ),
        Span::styled(format!("INFO: {}", entry.info), Style::default().fg(color)),
    ])
}

fn render_footer(frame: &mut Frame, area: Rect, dashboard: &Dashboard) {
    let pending = dashboard.pending_confirmation_prompt();
    let status_text = pending
        .map(|prompt| format!("{prompt}? (y/n)"))
        .unwrap_or_else(|| dashboard.status().to_string());
    let (status_fg, status_bg) = if pending.is_some() {
        (Color::Black, WARN)
    } else {
        (Color::White, PL_B)
    };

    let mut left = Vec::new();
    push_powerline_segment(&mut left, " 󰘳 ", Color::White, PL_A, status_bg);
    push_powerline_segment(
        &mut left,
        format!(
            " {status_text} ",
            status_text = compact_text(&status_text, area.width.saturating_sub(28) as usize)
        ),
        status_fg,
        status_bg,
        BG,
    );

    let socket = dashboard.socket_state();
    let socket_bg = match socket {
        SocketState::Open => PL_A,
        SocketState::Connecting => PL_D,
        SocketState::Closed => ERROR,
    };
    let mut right = Vec::new();
    push_powerline_segment_rtl(
        &mut right,
        format!(" 󰖟 ws {} ", socket.label()),
        Color::White,
        socket_bg,
        BG,
    );
    push_powerline_segment_rtl(&mut right, " ? help ", Color::White, PL_C, socket_bg);

    let right_width = (spans_width(&right) as u16).min(area.width / 2);
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(Line::from(left)).style(Style::default().bg(BG)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(Line::from(right)).style(Style::default().bg(BG)),
        chunks[1],
    );
}

fn render_help_modal(frame: &mut Frame) {
    let area = centered_rect(64, 60, frame.area());
    frame.render_widget(Clear, area);

    let lines = [
        "fleetdash help",
        "",
        "c / +        create instance",
        "s            start selected (when stopped)",
        "x            stop selected (when running)",
        "d / Del      delete selected (asks y/n)",
        "r / F5       reload instance list",
        "Tab          switch instances / worklog",
        "j k ↑ ↓      move",
        "gg G         top / bottom (G resumes worklog follow)",
        "PgUp PgDn    page",
        "q / Ctrl+c   quit",
    ]
    .map(Line::from)
    .to_vec();

    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));

    frame.render_widget(modal, area);
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if focused {
            Style::default().fg(ACCENT)
        } else {
            Style::default().fg(MUTED)
        })
        .style(Style::default().bg(PANEL))
}

fn status_style(state: InstanceState) -> Style {
    match state {
        InstanceState::Running => Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        InstanceState::Stopped => Style::default().fg(WARN),
    }
}

fn actions_label(controls: CardControls) -> String {
    let mut labels = Vec::new();
    if controls.start {
        labels.push("[s]tart");
    }
    if controls.stop {
        labels.push("[x]stop");
    }
    if controls.delete {
        labels.push("[d]elete");
    }
    labels.join(" ")
}

fn compact_timestamp(timestamp: &str) -> String {
    match timestamp.split_once('T') {
        Some((_, time)) => compact_text(time.trim_end_matches('Z'), 12),
        None => compact_text(timestamp, 19),
    }
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled(SEPARATOR, Style::default().fg(bg).bg(next_bg)));
}

fn push_powerline_segment_rtl(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(SEPARATOR_RTL, Style::default().fg(bg).bg(next_bg)));
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|span| span.content.chars().count()).sum()
}

fn table_rows_visible(area: Rect) -> usize {
    area.height.saturating_sub(3).max(1) as usize
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn display_backend(backend: &str) -> String {
    let trimmed = backend.trim().trim_end_matches('/');
    trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed)
        .to_string()
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
