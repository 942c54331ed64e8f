//! UI rendering for the TUI.

use chrono::{DateTime, Local};
use ratatui::{
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use todaytasks_core::command::NoteTarget;
use todaytasks_core::issues::issue_key;
use todaytasks_core::schedule::{self, Occurrence};
use todaytasks_core::{AppContext, PrStatus, Subtask, Translator, WorkStore};

use crate::app::{App, Screen};

/// Border color for the subtask block
const BORDER_SUBTASKS: Color = Color::Rgb(0, 150, 150);
/// Border color for notes blocks
const BORDER_NOTES: Color = Color::Rgb(180, 100, 180);
/// Border color for the right-hand panels
const BORDER_SIDE: Color = Color::Rgb(80, 160, 80);
/// Secondary text
const DIM: Color = Color::Rgb(128, 128, 128);
/// Highlighted row background
const SELECTED_BG: Color = Color::Rgb(50, 50, 80);

/// Render the application UI.
pub fn render(frame: &mut Frame, app: &App) {
    let work = app.ctx.snapshot();
    let now = Local::now();
    match &app.screen {
        Screen::Main => render_main_view(frame, app, &work, now),
        Screen::Notes(target) => render_notes_view(frame, app, &work, target),
    }
}

// ============================================
// Main view
// ============================================

fn render_main_view(frame: &mut Frame, app: &App, work: &WorkStore, now: DateTime<Local>) {
    let tr = &app.ctx.translator;
    let notices = app.ctx.notices.snapshot();
    let help_height = u16::from(app.show_help) * 2;

    let [header, body, notice_area, status, prompt, help] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(5),
        Constraint::Length(notices.len() as u16),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(help_height),
    ])
    .areas(frame.area());

    render_header(frame, tr, work, now, header);

    let [left, right] =
        Layout::horizontal([Constraint::Percentage(62), Constraint::Percentage(38)]).areas(body);

    let ticket_notes = work
        .current_ticket
        .as_ref()
        .and_then(|t| work.notes.get(t))
        .map(Vec::len)
        .unwrap_or(0);
    let [subtask_area, notes_area] = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length((ticket_notes.max(1) + 2).min(10) as u16),
    ])
    .areas(left);
    render_subtasks(frame, app, work, subtask_area);
    render_ticket_notes(frame, tr, work, notes_area);

    let reviews = app.ctx.reviews();
    let [tickets_area, events_area, reviews_area] = Layout::vertical([
        Constraint::Min(3),
        Constraint::Min(4),
        Constraint::Length(if reviews.is_empty() { 0 } else { reviews.len().min(6) as u16 + 2 }),
    ])
    .areas(right);
    render_tickets(frame, tr, work, tickets_area);
    render_events(frame, tr, work, now, events_area);
    if !reviews.is_empty() {
        let lines: Vec<Line> = reviews
            .iter()
            .map(|r| {
                Line::from(vec![
                    Span::styled(format!("{}: ", r.repo), Style::default().fg(DIM)),
                    Span::raw(r.title.clone()),
                ])
            })
            .collect();
        frame.render_widget(
            Paragraph::new(lines).block(side_block(tr.t("ui_reviews_title", &[]))),
            reviews_area,
        );
    }

    render_notices(frame, app, notice_area);
    render_status(frame, app, status);
    render_prompt(frame, app, prompt);
    if app.show_help {
        render_help(frame, tr.t("ui_help_main", &[]), help);
    }
}

fn render_header(
    frame: &mut Frame,
    tr: &Translator,
    work: &WorkStore,
    now: DateTime<Local>,
    area: Rect,
) {
    let title = match &work.current_ticket {
        Some(ticket) => {
            let elapsed = work
                .task_start_time
                .map(|start| format_elapsed(now.signed_duration_since(start)))
                .unwrap_or_default();
            tr.t(
                "ui_task_header",
                &[("name", ticket), ("elapsed", &elapsed)],
            )
        }
        None => tr.t("ui_no_active_task", &[]),
    };
    let [left, right] =
        Layout::horizontal([Constraint::Min(10), Constraint::Length(6)]).areas(area);
    frame.render_widget(
        Paragraph::new(title)
            .style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::BOTTOM)),
        left,
    );
    frame.render_widget(
        Paragraph::new(now.format("%H:%M").to_string())
            .style(Style::default().fg(DIM))
            .block(Block::default().borders(Borders::BOTTOM)),
        right,
    );
}

fn render_subtasks(frame: &mut Frame, app: &App, work: &WorkStore, area: Rect) {
    let tr = &app.ctx.translator;
    let subtasks = work.visible_subtasks();
    let mut lines = Vec::new();

    if work.current_ticket.is_some() && subtasks.is_empty() {
        lines.push(Line::styled(tr.t("ui_no_subtasks", &[]), Style::default().fg(DIM)));
    }
    for (i, (name, subtask)) in subtasks.iter().enumerate() {
        let selected = app.selected_subtask == Some(i);
        lines.push(subtask_line(tr, i, name, subtask, selected));
        if let Some(line) = issue_line(&app.ctx, name) {
            lines.push(line);
        }
        if selected {
            lines.extend(pr_detail_lines(subtask));
        }
    }

    let block = Block::default()
        .title(tr.t("ui_subtasks_title", &[]))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_SUBTASKS));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn subtask_line(
    tr: &Translator,
    index: usize,
    name: &str,
    subtask: &Subtask,
    selected: bool,
) -> Line<'static> {
    let mark = if subtask.done { "[x]" } else { "[ ]" };
    let mut name_style = Style::default();
    if subtask.done {
        name_style = name_style.fg(DIM).add_modifier(Modifier::CROSSED_OUT);
    }
    if subtask.focused {
        name_style = name_style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
    }

    let mut spans = vec![
        Span::styled(format!("{:>2}. ", index + 1), Style::default().fg(DIM)),
        Span::raw(format!("{mark} ")),
        Span::styled(name.to_string(), name_style),
    ];
    if subtask.focused {
        spans.push(Span::styled(" ★", Style::default().fg(Color::Yellow)));
    }
    if let Some(status) = subtask.pr_status {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            tr.t("ui_pr_label", &[("status", &status.as_str())]),
            Style::default().fg(pr_color(status)),
        ));
    }

    let line = Line::from(spans);
    if selected {
        line.style(Style::default().bg(SELECTED_BG))
    } else {
        line
    }
}

fn pr_color(status: PrStatus) -> Color {
    match status {
        PrStatus::Waiting => DIM,
        PrStatus::AttentionNeeded => Color::Red,
        PrStatus::Approved => Color::Green,
        PrStatus::Merged => Color::Magenta,
    }
}

/// Summary of the linked issue from the cache, if one was fetched.
fn issue_line(ctx: &AppContext, subtask: &str) -> Option<Line<'static>> {
    let key = issue_key(subtask)?;
    let summary = ctx.issues.get(&key)?.summary();
    let parts: Vec<String> = [summary.status, summary.summary, summary.assignee]
        .into_iter()
        .flatten()
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(Line::styled(
        format!("      {}", parts.join(" · ")),
        Style::default().fg(DIM),
    ))
}

fn pr_detail_lines(subtask: &Subtask) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(url) = subtask.pr_url() {
        lines.push(Line::styled(format!("      {url}"), Style::default().fg(Color::Blue)));
    }
    if let Some(details) = &subtask.pr_details {
        lines.push(Line::raw(format!("      {}", details.status_text)));
        for approver in &details.approvers_formatted {
            lines.push(Line::raw(format!("        {approver}")));
        }
    }
    lines
}

fn render_ticket_notes(frame: &mut Frame, tr: &Translator, work: &WorkStore, area: Rect) {
    let notes = work
        .current_ticket
        .as_ref()
        .and_then(|t| work.notes.get(t))
        .map(Vec::as_slice)
        .unwrap_or_default();
    let lines: Vec<Line> = notes.iter().map(|n| Line::raw(format!("• {n}"))).collect();
    let block = Block::default()
        .title(tr.t("ui_notes_title", &[]))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_NOTES));
    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }).block(block),
        area,
    );
}

fn side_block(title: String) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_SIDE))
}

fn render_tickets(frame: &mut Frame, tr: &Translator, work: &WorkStore, area: Rect) {
    let paused = tr.t("ui_paused_marker", &[]);
    let lines: Vec<Line> = work
        .displayable_tickets()
        .into_iter()
        .enumerate()
        .map(|(i, ticket)| {
            let current = work.current_ticket.as_deref() == Some(ticket.as_str());
            let mut spans = vec![
                Span::styled(format!("{:>2}. ", i + 1), Style::default().fg(DIM)),
                if current {
                    Span::styled(ticket.clone(), Style::default().fg(Color::Cyan).bold())
                } else {
                    Span::raw(ticket.clone())
                },
            ];
            if work.is_paused(&ticket) {
                spans.push(Span::styled(format!(" ({paused})"), Style::default().fg(DIM)));
            }
            Line::from(spans)
        })
        .collect();
    frame.render_widget(
        Paragraph::new(lines).block(side_block(tr.t("ui_tickets_title", &[]))),
        area,
    );
}

fn render_events(
    frame: &mut Frame,
    tr: &Translator,
    work: &WorkStore,
    now: DateTime<Local>,
    area: Rect,
) {
    let day = schedule::today(work, now.naive_local());
    let [upcoming_area, past_area] = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length(if day.past.is_empty() { 0 } else { day.past.len().min(5) as u16 + 2 }),
    ])
    .areas(area);

    let mut upcoming: Vec<Line> = day
        .upcoming
        .iter()
        .map(|o| occurrence_line(tr, o, Style::default()))
        .collect();
    if upcoming.is_empty() {
        upcoming.push(Line::styled(tr.t("ui_no_events", &[]), Style::default().fg(DIM)));
    }
    frame.render_widget(
        Paragraph::new(upcoming).block(side_block(tr.t("ui_upcoming_title", &[]))),
        upcoming_area,
    );

    if !day.past.is_empty() {
        let past: Vec<Line> = day
            .past
            .iter()
            .map(|o| occurrence_line(tr, o, Style::default().fg(DIM)))
            .collect();
        frame.render_widget(
            Paragraph::new(past).block(side_block(tr.t("ui_past_title", &[]))),
            past_area,
        );
    }
}

fn occurrence_line(tr: &Translator, occurrence: &Occurrence, style: Style) -> Line<'static> {
    let kind = tr.t(&format!("event_kind_{}", occurrence.kind.as_str()), &[]);
    let mut text = format!(
        "{} {} {}",
        occurrence.at.format("%H:%M"),
        kind,
        occurrence.details
    );
    if occurrence.recurring {
        text.push_str(&format!(" ({})", tr.t("recurring", &[])));
    }
    Line::styled(text, style)
}

// ============================================
// Notes views
// ============================================

fn render_notes_view(frame: &mut Frame, app: &App, work: &WorkStore, target: &NoteTarget) {
    let tr = &app.ctx.translator;
    let notices = app.ctx.notices.snapshot();
    let help_height = u16::from(app.show_help) * 2;

    let [header, body, notice_area, status, prompt, help] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(3),
        Constraint::Length(notices.len() as u16),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(help_height),
    ])
    .areas(frame.area());

    let title = match target {
        NoteTarget::Ticket(ticket) => tr.t("ui_entity_notes_title", &[("name", ticket)]),
        NoteTarget::Subtask { ticket, name } => tr.t(
            "ui_entity_notes_title",
            &[("name", &format!("{ticket} / {name}"))],
        ),
        NoteTarget::Day(day) => tr.t(
            "ui_daily_notes_title",
            &[("date", &day.format("%Y-%m-%d"))],
        ),
    };
    frame.render_widget(
        Paragraph::new(title)
            .style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::BOTTOM)),
        header,
    );

    let notes = target.notes(work);
    let mut lines: Vec<Line> = notes
        .iter()
        .enumerate()
        .map(|(i, note)| {
            let line = Line::from(vec![
                Span::styled(format!("{:>2}. ", i + 1), Style::default().fg(DIM)),
                Span::raw(note.clone()),
            ]);
            if app.selected_note == Some(i) {
                line.style(Style::default().bg(SELECTED_BG))
            } else {
                line
            }
        })
        .collect();
    if lines.is_empty() {
        lines.push(Line::styled(tr.t("ui_no_notes", &[]), Style::default().fg(DIM)));
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_NOTES));
    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }).block(block),
        body,
    );

    render_notices(frame, app, notice_area);
    render_status(frame, app, status);
    render_prompt(frame, app, prompt);
    if app.show_help {
        render_help(frame, tr.t("ui_help_notes", &[]), help);
    }
}

// ============================================
// Shared footer rows
// ============================================

/// Sticky notices from the workers, one per row.
fn render_notices(frame: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app
        .ctx
        .notices
        .snapshot()
        .into_iter()
        .map(|n| Line::styled(format!("! {}", n.text), Style::default().fg(Color::Red)))
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(notice) = &app.notice {
        frame.render_widget(
            Paragraph::new(notice.as_str()).style(Style::default().fg(Color::Yellow)),
            area,
        );
    }
}

fn render_prompt(frame: &mut Frame, app: &App, area: Rect) {
    let prompt = Line::from(vec![
        Span::styled("> ", Style::default().fg(Color::Yellow)),
        Span::raw(app.input.clone()),
    ]);
    frame.render_widget(Paragraph::new(prompt), area);

    let x = area.x + 2 + app.input.chars().count() as u16;
    frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
}

fn render_help(frame: &mut Frame, text: String, area: Rect) {
    frame.render_widget(
        Paragraph::new(text)
            .style(Style::default().fg(DIM))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::TOP)),
        area,
    );
}

/// Format elapsed time as "2h 05m" or "7m".
fn format_elapsed(elapsed: chrono::Duration) -> String {
    let minutes = elapsed.num_minutes().max(0);
    if minutes >= 60 {
        format!("{}h {:02}m", minutes / 60, minutes % 60)
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;
    use ratatui::Terminal;
    use std::sync::Arc;
    use todaytasks_core::issues::IssueCache;
    use todaytasks_core::{Config, NoticeSource};

    fn render_app(app: &App) -> Buffer {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        terminal.backend().buffer().clone()
    }

    fn buffer_to_string(buffer: &Buffer) -> String {
        let area = buffer.area;
        let mut result = String::new();
        for y in 0..area.height {
            for x in 0..area.width {
                result.push(buffer[(x, y)].symbol().chars().next().unwrap_or(' '));
            }
            result.push('\n');
        }
        result
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(chrono::Duration::minutes(7)), "7m");
        assert_eq!(format_elapsed(chrono::Duration::minutes(125)), "2h 05m");
        assert_eq!(format_elapsed(chrono::Duration::minutes(-3)), "0m");
    }

    #[test]
    fn test_main_view_shows_tickets_and_notices() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut work = WorkStore::default();
        work.current_ticket = Some("ABC-1".into());
        work.sub_tasks
            .entry("ABC-1".into())
            .or_default()
            .insert("write docs".into(), Subtask::default());
        work.notes.insert("OLD-7".into(), vec!["left over".into()]);

        let (ctx, _queue) = AppContext::new(
            Config::default(),
            Translator::empty(),
            dir.path().join("tasks.json"),
            work,
            IssueCache::in_memory(),
        );
        ctx.notices.raise(NoticeSource::Tracker, "tracker down");
        let app = App::new(Arc::new(ctx));

        let screen = buffer_to_string(&render_app(&app));
        assert!(screen.contains("ABC-1"));
        assert!(screen.contains("OLD-7"));
        assert!(screen.contains("write docs"));
        assert!(screen.contains("! tracker down"));
    }
}
