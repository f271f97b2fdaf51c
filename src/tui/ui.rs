use super::app::App;
use super::density::{DENSITY_THRESHOLD, bucket_color, bucket_events};
use super::markers::{MarkerKind, RenderedMarker};
use super::search::MatchNavigator;
use crate::parser::EventId;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

const TIMELINE_CELL: char = '█';
const MARKER_CELL: char = '━';

pub fn draw(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header line
            Constraint::Length(1), // Divider
            Constraint::Min(1),    // Timeline rows
            Constraint::Length(1), // Marker strip
            Constraint::Length(7), // Details panel
            Constraint::Length(1), // Footer or search bar
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);
    draw_divider(f, chunks[1]);
    draw_timeline(f, app, chunks[2]);
    draw_marker_strip(f, app, chunks[3]);
    draw_details(f, app, chunks[4]);

    if app.search_state.active {
        draw_search_bar(f, app, chunks[5]);
    } else {
        draw_footer(f, chunks[5]);
    }

    if app.show_help {
        draw_help(f);
    }
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let file_name = app
        .file_path
        .as_ref()
        .and_then(|p| std::path::Path::new(p).file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("apex log");

    let (v0, v1) = app.viewport.visible_range();
    let header_text = format!(
        "apexlog-tui: {} | Events: {} | Issues: {} | Depth: {} | Window: {} - {}",
        file_name,
        app.summary.total_events,
        app.summary.issue_count,
        app.summary.max_depth,
        format_ns(v0),
        format_ns(v1.min(app.viewport.total_ns)),
    );

    let header = Paragraph::new(header_text).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );

    f.render_widget(header, area);
}

fn draw_divider(f: &mut Frame, area: Rect) {
    let divider = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::DarkGray));

    f.render_widget(divider, area);
}

/// One flame row per call depth. Sparse rows draw each visible event as
/// a colored span; rows past the density threshold collapse into
/// per-column buckets with count-derived opacity.
fn draw_timeline(f: &mut Frame, app: &mut App, area: Rect) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    app.viewport.set_width(area.width);
    app.playhead_col = app.playhead_col.min(area.width - 1);

    let visible = app.viewport.cull(&app.log);
    let width = area.width as usize;
    let row_count = area.height as usize;

    let mut rows: Vec<Vec<EventId>> = vec![Vec::new(); row_count];
    for &id in &visible {
        if let Some(row) = rows.get_mut(app.depths[id]) {
            row.push(id);
        }
    }

    let current_match = app.search_state.cursor.current().cloned();

    let mut lines = Vec::with_capacity(row_count);
    for (row_idx, ids) in rows.iter().enumerate() {
        let mut cells: Vec<Option<Color>> = vec![None; width];
        let mut emphasis: Vec<bool> = vec![false; width];

        if ids.len() > DENSITY_THRESHOLD {
            let buckets = bucket_events(&app.log, &app.viewport, ids);
            for (col, bucket) in buckets.iter().enumerate() {
                cells[col] = bucket_color(bucket, &app.theme, &app.opacities);
            }
        } else {
            for &id in ids {
                let event = app.log.event(id);
                let (start, end) = event.span();
                if let Some((first, last)) = app.viewport.span_to_cols(start, end) {
                    let color = app.theme.color(event.category());
                    for col in first..=last {
                        cells[col as usize] = Some(color);
                    }
                }
            }
        }

        if let Some(hit) = &app.selected
            && hit.depth == row_idx
        {
            let (start, end) = app.log.event(hit.event).span();
            if let Some((first, last)) = app.viewport.span_to_cols(start, end) {
                for col in first..=last {
                    emphasis[col as usize] = true;
                }
            }
        }
        if let Some(found) = &current_match
            && found.depth == row_idx
        {
            let last = (found.rect.x + found.rect.width.saturating_sub(1)).min(area.width - 1);
            for col in found.rect.x..=last {
                emphasis[col as usize] = true;
            }
        }

        let mut spans = Vec::with_capacity(width);
        for col in 0..width {
            let mut style = match cells[col] {
                Some(color) => Style::default().fg(color),
                None => Style::default(),
            };
            if emphasis[col] {
                style = style.add_modifier(Modifier::REVERSED);
            }
            if col == app.playhead_col as usize {
                style = style.bg(Color::DarkGray);
            }
            let ch = if cells[col].is_some() {
                TIMELINE_CELL
            } else {
                ' '
            };
            spans.push(Span::styled(ch.to_string(), style));
        }
        lines.push(Line::from(spans));
    }

    f.render_widget(Paragraph::new(lines), area);
}

/// Single-row marker strip under the timeline. Overlapping markers are
/// painted in ascending severity so the highest rank shows; the drawn
/// intervals are recorded in world columns for hit-testing.
fn draw_marker_strip(f: &mut Frame, app: &mut App, area: Rect) {
    if area.width == 0 {
        return;
    }

    let width = area.width as usize;
    let offset = app.viewport.offset_cols();
    let mut cells: Vec<Option<MarkerKind>> = vec![None; width];
    app.rendered_markers.clear();

    for (idx, marker) in app.markers.iter().enumerate() {
        let Some((first, last)) = app.viewport.span_to_cols(marker.start_time, marker.end_time)
        else {
            continue;
        };
        for col in first..=last {
            let cell = &mut cells[col as usize];
            if cell.is_none_or(|kind| kind < marker.kind) {
                *cell = Some(marker.kind);
            }
        }
        app.rendered_markers.push(RenderedMarker {
            marker: idx,
            start_x: offset + first as i64,
            end_x: offset + last as i64,
        });
    }

    let mut spans = Vec::with_capacity(width);
    for (col, cell) in cells.iter().enumerate() {
        let mut style = match cell {
            Some(kind) => Style::default().fg(kind.color()),
            None => Style::default().fg(Color::DarkGray),
        };
        if col == app.playhead_col as usize {
            style = style.bg(Color::DarkGray);
        }
        let ch = if cell.is_some() { MARKER_CELL } else { '─' };
        spans.push(Span::styled(ch.to_string(), style));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_details(f: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();

    if let Some(hit) = &app.selected {
        let event = app.log.event(hit.event);
        lines.push(Line::from(vec![
            Span::styled(
                event.kind.label().to_string(),
                Style::default().fg(app.theme.color(event.category())),
            ),
            Span::styled(
                format!("  depth {}  line {}", hit.depth, event.line_number),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        if !event.text.is_empty() {
            lines.push(Line::from(event.text.clone()));
        }
        if let Some(ns) = &event.namespace {
            lines.push(Line::from(Span::styled(
                format!("Namespace: {}", ns),
                Style::default().fg(Color::Magenta),
            )));
        }
        let (start, end) = event.span();
        lines.push(Line::from(format!(
            "Span: {} - {}",
            format_ns(start),
            format_ns(end)
        )));
        lines.push(Line::from(format!(
            "Duration: {} total, {} self",
            format_ns(event.duration.total),
            format_ns(event.duration.net)
        )));
        if !event.children.is_empty() {
            lines.push(Line::from(format!("Children: {}", event.children.len())));
        }
    } else if let Some(idx) = app.selected_marker {
        let marker = &app.markers[idx];
        lines.push(Line::from(Span::styled(
            marker.summary.clone(),
            Style::default().fg(marker.kind.color()),
        )));
        if !marker.metadata.is_empty() {
            lines.push(Line::from(marker.metadata.clone()));
        }
        lines.push(Line::from(format!(
            "At: {} - {}",
            format_ns(marker.start_time),
            format_ns(marker.end_time)
        )));
    } else {
        lines.push(Line::from(format!(
            "Log: {} events, {} issues, {} deep, {} bytes",
            app.summary.total_events,
            app.summary.issue_count,
            app.summary.max_depth,
            app.summary.size_bytes
        )));
        lines.push(Line::from(format!(
            "Duration: {}",
            format_ns(app.summary.duration_ns)
        )));
        if !app.log.debug_levels.is_empty() {
            let levels = app
                .log
                .debug_levels
                .iter()
                .map(|l| format!("{}:{}", l.key, l.level))
                .collect::<Vec<_>>()
                .join(" ");
            lines.push(Line::from(Span::styled(
                format!("Debug levels: {}", levels),
                Style::default().fg(Color::DarkGray),
            )));
        }
        lines.push(Line::from(Span::styled(
            "Enter: inspect event at playhead | m: inspect marker",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let details = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(details, area);
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let footer = Paragraph::new(
        "←→: Playhead | h/l: Pan | +/-: Zoom | f: Fit | Enter: Select | /: Search | q: Quit | ?: Help",
    )
    .style(Style::default().fg(Color::DarkGray));
    f.render_widget(footer, area);
}

fn draw_search_bar(f: &mut Frame, app: &App, area: Rect) {
    let total = app.search_state.cursor.len();
    let match_info = if total == 0 {
        if app.search_state.query.is_empty() {
            String::new()
        } else {
            "  [No matches]".to_string()
        }
    } else {
        match app.search_state.cursor.position() {
            Some(pos) => format!("  [Match {}/{}]", pos + 1, total),
            None => format!("  [{} matches]", total),
        }
    };

    let text = format!(
        "Search: {}█{}  Enter:accept Esc:cancel n:next N:prev",
        app.search_state.query, match_info
    );
    let paragraph =
        Paragraph::new(text).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(paragraph, area);
}

fn draw_help(f: &mut Frame) {
    let help_text = vec![
        Line::from(Span::styled(
            "apexlog-tui Help",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Navigation:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from("  ←/→         Move playhead one column"),
        Line::from("  h/l         Pan window left/right"),
        Line::from("  +/=         Zoom in at playhead"),
        Line::from("  -           Zoom out at playhead"),
        Line::from("  f           Fit whole log"),
        Line::from("  Home/g      Jump to log start"),
        Line::from("  End/G       Jump to log end"),
        Line::from(""),
        Line::from(Span::styled(
            "Inspection:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from("  Enter       Inspect event under playhead"),
        Line::from("  m           Inspect marker under playhead"),
        Line::from("  Esc         Clear selection"),
        Line::from(""),
        Line::from(Span::styled(
            "Search:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from("  /           Start search"),
        Line::from("  n           Next match"),
        Line::from("  N           Previous match"),
        Line::from("  Enter       Accept search"),
        Line::from("  Esc         Cancel search"),
        Line::from(""),
        Line::from(Span::styled(
            "Other:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from("  q/Q         Quit"),
        Line::from("  ?           Toggle this help"),
        Line::from("  Ctrl+C      Force quit"),
        Line::from(""),
        Line::from(Span::styled(
            "Press ? or Esc to close help",
            Style::default().fg(Color::Yellow),
        )),
    ];

    let help = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .wrap(Wrap { trim: true });

    let area = centered_rect(60, 80, f.area());
    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(help, area);
}

/// Nanoseconds rendered for humans: whole units, largest that fits
fn format_ns(ns: u64) -> String {
    if ns >= 1_000_000_000 {
        format!("{:.3}s", ns as f64 / 1e9)
    } else if ns >= 1_000_000 {
        format!("{:.3}ms", ns as f64 / 1e6)
    } else if ns >= 1_000 {
        format!("{:.1}us", ns as f64 / 1e3)
    } else {
        format!("{}ns", ns)
    }
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
