use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::models::SummaryStatus;

pub fn draw(frame: &mut Frame, app: &App) {
    // Main horizontal split: 1/3 left, 2/3 right
    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3), // Left pane: feed
            Constraint::Ratio(2, 3), // Right pane: detail
        ])
        .split(frame.area());

    // Left pane: header + feed + status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(0),    // Publication list
            Constraint::Length(1), // Status line
        ])
        .split(main_chunks[0]);

    // Right pane: title + original/summary columns + status
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Title and metadata
            Constraint::Min(0),    // Original beside summary
            Constraint::Length(1), // Summary status
        ])
        .split(main_chunks[1]);

    let text_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(right_chunks[1]);

    render_header(frame, app, left_chunks[0]);
    render_feed(frame, app, left_chunks[1]);
    render_left_status(frame, left_chunks[2]);

    render_title(frame, app, right_chunks[0]);
    render_original(frame, app, text_chunks[0]);
    render_summary(frame, app, text_chunks[1]);
    render_right_status(frame, app, right_chunks[2]);

    if app.search_input_active {
        render_search_input(frame, app);
    }

    if app.show_help {
        render_help(frame);
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let mut title = format!(" PressPaper [{}", app.filter_label());
    if let Some(topic) = app.topic_label() {
        title.push_str(&format!(" | {topic}"));
    }
    if let Some(search) = &app.search {
        title.push_str(&format!(" | \"{search}\""));
    }
    title.push_str("] ");
    let stats = format!(" {} shown | {} stored", app.records.len(), app.total);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let paragraph = Paragraph::new(stats).style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, inner);
}

fn render_feed(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .records
        .iter()
        .map(|record| {
            let marker = if record.summary_text.is_some() { "✓ " } else { "  " };

            let line = Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Green)),
                Span::styled(
                    format!("{} ", record.display_date()),
                    Style::default().fg(Color::Blue),
                ),
                Span::styled(record.title.as_str(), Style::default().fg(Color::White)),
            ]);

            ListItem::new(line)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !app.records.is_empty() {
        state.select(Some(app.selected_index));
    }

    frame.render_stateful_widget(list, area, &mut state);
}

fn render_left_status(frame: &mut Frame, area: Rect) {
    let status = "j/k:nav  f:category  t:topic  /:search  ?:help  q:quit";
    let paragraph = Paragraph::new(status).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn render_title(frame: &mut Frame, app: &App, area: Rect) {
    let lines = match app.selected_record() {
        Some(record) => {
            let mut meta = vec![record.display_date()];
            if let Some(category) = &record.category {
                meta.push(category.clone());
            }
            if !record.topics.is_empty() {
                meta.push(record.topics.join(", "));
            }
            vec![
                Line::from(Span::styled(
                    record.title.as_str(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    meta.join(" | "),
                    Style::default().fg(Color::DarkGray),
                )),
            ]
        }
        None => vec![Line::from("No publication selected")],
    };

    let block = Block::default()
        .title(" Publication ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, area);
}

fn render_original(frame: &mut Frame, app: &App, area: Rect) {
    let content = app
        .selected_record()
        .map(|r| r.original_text.as_str())
        .unwrap_or("");

    let block = Block::default()
        .title(" Original ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let scroll = clamped_scroll(content, area, app.detail_scroll);
    let paragraph = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let content = match app.summary_status() {
        SummaryStatus::NoSelection => String::new(),
        SummaryStatus::Pending => {
            "No summary yet.\n\nRun `presspaper run` with an API key configured to generate one."
                .to_string()
        }
        SummaryStatus::Generated => app
            .selected_record()
            .and_then(|r| r.summary_text.clone())
            .unwrap_or_default(),
    };

    let block = Block::default()
        .title(" Summary ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let scroll = clamped_scroll(&content, area, app.detail_scroll);
    let paragraph = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));

    frame.render_widget(paragraph, area);
}

/// Scroll offset for a bordered pane, stopped where its last line reaches the
/// bottom edge so a short text stays in view while a longer neighbour scrolls.
fn clamped_scroll(content: &str, area: Rect, scroll: u16) -> u16 {
    let width = area.width.saturating_sub(2).max(1) as usize;
    let height = area.height.saturating_sub(2) as usize;
    let lines: usize = content
        .lines()
        .map(|line| textwrap::wrap(line, width).len().max(1))
        .sum();
    let max_scroll = lines.saturating_sub(height).min(u16::MAX as usize) as u16;
    scroll.min(max_scroll)
}

fn render_right_status(frame: &mut Frame, app: &App, area: Rect) {
    let status = app.summary_status();
    let mut text = status.label().to_string();

    if let Some(record) = app.selected_record() {
        if let (SummaryStatus::Generated, Some(model)) = (status, &record.summary_model) {
            text.push_str(&format!(" ({model})"));
        }
        text.push_str(&format!(" | {}", record.source_url));
    }

    let paragraph = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn render_search_input(frame: &mut Frame, app: &App) {
    let area = centered_rect(60, 20, frame.area());

    let block = Block::default()
        .title(" Search titles (Enter to apply, empty to clear) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let inner = block.inner(area);

    frame.render_widget(Clear, area);
    frame.render_widget(block, area);

    let input_text = format!("> {}_", app.search_input);
    let paragraph = Paragraph::new(input_text).style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, inner);
}

fn render_help(frame: &mut Frame) {
    let area = centered_rect(50, 60, frame.area());

    let help_text = vec![
        "",
        " Navigation:",
        "   j / ↓    Move down",
        "   k / ↑    Move up",
        "   g / G    First / last",
        "   PgDn     Scroll detail down",
        "   PgUp     Scroll detail up",
        "",
        " Actions:",
        "   f        Cycle category filter",
        "   t        Cycle topic filter",
        "   /        Search titles",
        "   o        Open source page in browser",
        "   r        Reload from the database",
        "",
        " General:",
        "   ?        Toggle this help",
        "   q        Quit",
        "",
        " Press any key to close",
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(help_text.join("\n"))
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
