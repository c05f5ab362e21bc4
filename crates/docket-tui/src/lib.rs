// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use docket_app::{
    AppCommand, AppState, DeliveryNoteSummary, InvoiceListState, InvoiceSummary, LayoutMetrics,
    ListCommand, RenderEntry, TabKind,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Tabs};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;

const HALF_PAGE_ROWS: i64 = 10;
const FULL_PAGE_ROWS: i64 = 20;

/// Terminal rows per list element: headers take one row, invoices two.
const ROW_METRICS: LayoutMetrics = LayoutMetrics::new(1, 2);

/// Rows the frame chrome takes from the list body: tabs block (3), status
/// bar (2), body borders (2).
const CHROME_ROWS: u16 = 7;

pub trait AppRuntime {
    fn load_invoice_summaries(&mut self) -> Result<Vec<InvoiceSummary>>;
    fn load_delivery_note_summaries(&mut self) -> Result<Vec<DeliveryNoteSummary>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InternalEvent {
    ClearStatus { token: u64 },
}

pub struct ViewData {
    pub invoices: InvoiceListState,
    pub notes: Vec<DeliveryNoteSummary>,
    pub notes_scroll: u32,
    pub viewport_rows: u32,
    status_token: u64,
}

impl Default for ViewData {
    fn default() -> Self {
        Self {
            invoices: InvoiceListState::with_metrics(
                Vec::new(),
                OffsetDateTime::now_utc(),
                ROW_METRICS,
            ),
            notes: Vec::new(),
            notes_scroll: 0,
            viewport_rows: 0,
            status_token: 0,
        }
    }
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    match refresh_view_data(state, runtime, &mut view_data) {
        Ok(loaded) => {
            state.set_status(&loaded_status(loaded));
        }
        Err(error) => {
            state.set_status(&format!("load failed: {error}"));
        }
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &view_data, &internal_rx);

        let size = terminal.size().context("query terminal size")?;
        view_data.viewport_rows = u32::from(size.height.saturating_sub(CHROME_ROWS));

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(state: &mut AppState, view_data: &ViewData, rx: &Receiver<InternalEvent>) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.set_status(&message.into());
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn refresh_view_data<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<(usize, usize)> {
    let invoices = runtime.load_invoice_summaries()?;
    let invoice_count = invoices.len();
    view_data
        .invoices
        .replace_records(invoices, OffsetDateTime::now_utc());
    state.sync_focus(view_data.invoices.buckets().len());

    view_data.notes = runtime.load_delivery_note_summaries()?;
    view_data.notes_scroll = view_data
        .notes_scroll
        .min(view_data.notes.len().saturating_sub(1) as u32);
    Ok((invoice_count, view_data.notes.len()))
}

fn loaded_status((invoices, notes): (usize, usize)) -> String {
    format!("loaded {invoices} invoices, {notes} delivery notes")
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if state.show_help {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            state.dispatch(AppCommand::ToggleHelp);
        }
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => {
            state.dispatch(AppCommand::ToggleHelp);
            return false;
        }
        KeyCode::Tab => {
            state.dispatch(AppCommand::NextTab);
            return false;
        }
        KeyCode::BackTab => {
            state.dispatch(AppCommand::PrevTab);
            return false;
        }
        KeyCode::Char('r') => {
            match refresh_view_data(state, runtime, view_data) {
                Ok(loaded) => {
                    let message = loaded_status(loaded);
                    emit_status(state, view_data, internal_tx, message);
                }
                Err(error) => {
                    emit_status(state, view_data, internal_tx, format!("load failed: {error}"));
                }
            }
            return false;
        }
        _ => {}
    }

    match state.active_tab {
        TabKind::Invoices => handle_invoice_list_key(state, view_data, internal_tx, key),
        TabKind::DeliveryNotes => handle_note_list_key(view_data, key),
    }
    false
}

fn handle_invoice_list_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let buckets = view_data.invoices.buckets().len();
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => scroll_invoices(view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => scroll_invoices(view_data, -1),
        KeyCode::Char('d') => scroll_invoices(view_data, HALF_PAGE_ROWS),
        KeyCode::Char('u') => scroll_invoices(view_data, -HALF_PAGE_ROWS),
        KeyCode::PageDown => scroll_invoices(view_data, FULL_PAGE_ROWS),
        KeyCode::PageUp => scroll_invoices(view_data, -FULL_PAGE_ROWS),
        KeyCode::Char('g') | KeyCode::Home => {
            view_data.invoices.on_scroll(0.0);
        }
        KeyCode::Char('G') | KeyCode::End => {
            let target = end_scroll_offset(&view_data.invoices, view_data.viewport_rows);
            view_data.invoices.on_scroll(f64::from(target));
        }
        KeyCode::Char('n') => {
            state.dispatch(AppCommand::FocusNextBucket { buckets });
        }
        KeyCode::Char('p') => {
            state.dispatch(AppCommand::FocusPrevBucket { buckets });
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            let Some(bucket) = view_data.invoices.buckets().get(state.focused_bucket) else {
                return;
            };
            let key = bucket.key;
            let label = bucket.label();
            view_data.invoices.dispatch(ListCommand::ToggleBucket(key));
            let verb = if view_data.invoices.is_expanded(key) {
                "expanded"
            } else {
                "collapsed"
            };
            let message = format!("{label} {verb}");
            emit_status(state, view_data, internal_tx, message);
        }
        _ => {}
    }
}

fn handle_note_list_key(view_data: &mut ViewData, key: KeyEvent) {
    let max_scroll = view_data.notes.len().saturating_sub(1) as i64;
    let delta = match key.code {
        KeyCode::Char('j') | KeyCode::Down => 1,
        KeyCode::Char('k') | KeyCode::Up => -1,
        KeyCode::Char('d') => HALF_PAGE_ROWS,
        KeyCode::Char('u') => -HALF_PAGE_ROWS,
        KeyCode::PageDown => FULL_PAGE_ROWS,
        KeyCode::PageUp => -FULL_PAGE_ROWS,
        KeyCode::Char('g') | KeyCode::Home => -max_scroll - 1,
        KeyCode::Char('G') | KeyCode::End => max_scroll + 1,
        _ => return,
    };
    let next = (i64::from(view_data.notes_scroll) + delta).clamp(0, max_scroll);
    view_data.notes_scroll = next as u32;
}

/// Bottom-of-list scroll target: the last full viewport of content, so an
/// End jump never leaves the body empty.
fn end_scroll_offset(list: &InvoiceListState, viewport_rows: u32) -> u32 {
    list.layout().total_height.saturating_sub(viewport_rows)
}

fn scroll_invoices(view_data: &mut ViewData, delta: i64) {
    let next = i64::from(view_data.invoices.scroll_offset()) + delta;
    view_data.invoices.on_scroll(next as f64);
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let selected = TabKind::ALL
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let tab_titles = TabKind::ALL
        .iter()
        .map(|tab| tab_title(*tab, view_data))
        .collect::<Vec<String>>();
    let tabs = Tabs::new(tab_titles)
        .block(Block::default().title("docket").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    match state.active_tab {
        TabKind::Invoices => render_invoice_list(frame, layout[1], state, view_data),
        TabKind::DeliveryNotes => render_delivery_notes(frame, layout[1], view_data),
    }

    let status_widget = Paragraph::new(status_text(state))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if state.show_help {
        let area = centered_rect(70, 62, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_invoice_list(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let viewport_rows = u32::from(area.height.saturating_sub(2));
    let rows = invoice_rows(&view_data.invoices, state.focused_bucket, viewport_rows);

    let lines: Vec<Line<'_>> = rows
        .into_iter()
        .map(|row| match row.kind {
            RowKind::Header => Line::styled(
                row.text,
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            RowKind::Item => Line::raw(row.text),
        })
        .collect();

    let body = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(invoice_list_title(&view_data.invoices)),
    );
    frame.render_widget(body, area);
}

fn render_delivery_notes(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let viewport_rows = usize::from(area.height.saturating_sub(2));
    let lines: Vec<Line<'_>> = note_rows(&view_data.notes, view_data.notes_scroll, viewport_rows)
        .into_iter()
        .map(Line::raw)
        .collect();

    let body = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("delivery notes ({})", view_data.notes.len())),
    );
    frame.render_widget(body, area);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowKind {
    Header,
    Item,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ListRow {
    kind: RowKind,
    text: String,
}

/// Project the windowed render plan onto terminal rows. Only rows whose
/// absolute offset falls inside the viewport survive; the plan's one-item
/// overscan is trimmed here.
fn invoice_rows(
    list: &InvoiceListState,
    focused_bucket: usize,
    viewport_rows: u32,
) -> Vec<ListRow> {
    let plan = list.render_plan(f64::from(viewport_rows));
    let scroll = list.scroll_offset();
    let range_end = scroll.saturating_add(viewport_rows);
    let focused_key = list.buckets().get(focused_bucket).map(|bucket| bucket.key);

    let mut rows = Vec::new();
    for entry in &plan.entries {
        match entry {
            RenderEntry::Header {
                key,
                label,
                count,
                expanded,
                offset,
            } => {
                if *offset >= scroll && *offset < range_end {
                    let arrow = if *expanded { "▾" } else { "▸" };
                    let marker = if focused_key == Some(*key) { "› " } else { "  " };
                    rows.push(ListRow {
                        kind: RowKind::Header,
                        text: format!("{marker}{arrow} {label} ({count})"),
                    });
                }
            }
            RenderEntry::Item {
                invoice,
                offset,
                height,
            } => {
                let lines = invoice_item_lines(invoice);
                for (index, text) in lines.into_iter().enumerate().take(*height as usize) {
                    let row_offset = offset + index as u32;
                    if row_offset >= scroll && row_offset < range_end {
                        rows.push(ListRow {
                            kind: RowKind::Item,
                            text,
                        });
                    }
                }
            }
        }
    }
    rows
}

fn invoice_item_lines(invoice: &InvoiceSummary) -> [String; 2] {
    let confidence = invoice
        .confidence
        .map(|value| format!("{:.0}%", value * 100.0))
        .unwrap_or_default();
    [
        format!(
            "    {:<30} {:>12}  {}",
            truncate(&invoice.supplier, 30),
            format_pennies(invoice.total_amount_pennies),
            invoice.status.as_str(),
        ),
        format!(
            "      {}  {}  {confidence}",
            invoice.invoice_number,
            display_date(&invoice.invoice_date),
        ),
    ]
}

fn note_rows(notes: &[DeliveryNoteSummary], scroll: u32, viewport_rows: usize) -> Vec<String> {
    notes
        .iter()
        .skip(scroll as usize)
        .take(viewport_rows)
        .map(note_line)
        .collect()
}

fn note_line(note: &DeliveryNoteSummary) -> String {
    let pairing = note
        .invoice_id
        .as_ref()
        .map(|id| format!("↔ {}", truncate(id.as_str(), 12)))
        .unwrap_or_default();
    format!(
        "{:<16} {:<30} {}  {:>9}  {pairing}",
        note.delivery_number,
        truncate(&note.supplier, 30),
        display_date(&note.delivery_date),
        note.status.as_str(),
    )
}

fn invoice_list_title(list: &InvoiceListState) -> String {
    format!(
        "invoices ({} in {} groups)",
        list.total_records(),
        list.buckets().len()
    )
}

fn tab_title(tab: TabKind, view_data: &ViewData) -> String {
    let count = match tab {
        TabKind::Invoices => view_data.invoices.total_records(),
        TabKind::DeliveryNotes => view_data.notes.len(),
    };
    format!("{} ({count})", tab.label())
}

fn status_text(state: &AppState) -> String {
    if state.show_help {
        return String::new();
    }

    let default = "j/k d/u pg g/G | n/p group | enter toggle | tab switch | r reload | ? help | ctrl+q";
    let tab = state.active_tab.label();
    match &state.status_line {
        Some(status) => format!("{tab} | {status} | {default}"),
        None => format!("{tab} | {default}"),
    }
}

fn help_overlay_text() -> &'static str {
    "navigation\n\
     \x20 j/k or arrows   scroll one row\n\
     \x20 d/u             scroll half page\n\
     \x20 PgUp/PgDn       scroll full page\n\
     \x20 g/G, Home/End   jump to top/bottom\n\
     \n\
     groups\n\
     \x20 n/p             focus next/previous group\n\
     \x20 enter/space     expand or collapse focused group\n\
     \n\
     global\n\
     \x20 tab/shift-tab   switch between invoices and delivery notes\n\
     \x20 r               reload from the database\n\
     \x20 ?               toggle this help\n\
     \x20 q, ctrl+q       quit"
}

fn display_date(raw: &str) -> &str {
    raw.get(0..10).unwrap_or(raw)
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_owned();
    }
    let mut output: String = value.chars().take(max_chars.saturating_sub(1)).collect();
    output.push('…');
    output
}

fn format_pennies(pennies: i64) -> String {
    let (sign, pennies) = if pennies < 0 {
        ("-", pennies.saturating_abs())
    } else {
        ("", pennies)
    };
    let pounds = pennies / 100;
    let pence = pennies % 100;
    format!("{sign}£{}.{pence:02}", comma_format(pounds))
}

fn comma_format(value: i64) -> String {
    let digits = value.to_string();
    let mut output = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            output.push(',');
        }
        output.push(digit);
    }
    output
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
