use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use crate::app::{format_time, AnalysisStatus, App, MessageType};
use crate::ui::widgets::{render_help_view, render_status_bar};

/// Render the main UI
pub fn render_ui(frame: &mut Frame, app: &App) {
    // If help is shown, render help view instead of normal UI
    if app.show_help {
        render_help_view(frame, frame.area());
        return;
    }

    let message_height = if app.message.is_some() { 3 } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),              // Status bar
            Constraint::Length(1),              // Line break
            Constraint::Length(message_height), // Message bar
            Constraint::Length(1),              // Position gauge
            Constraint::Length(1),              // Line break
            Constraint::Min(1),                 // Details
        ])
        .split(frame.area());

    render_status_bar(frame, chunks[0], app);

    if let Some(ref msg) = app.message {
        let (color, prefix) = match msg.msg_type {
            MessageType::Info => (Color::Green, "✔ "),
            MessageType::Warning => (Color::Yellow, "⚠ "),
            MessageType::Error => (Color::Red, "✖ "),
        };

        let text = format!("{}{}", prefix, msg.text);
        let message_widget = Paragraph::new(Line::from(text))
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::ALL));

        frame.render_widget(message_widget, chunks[2]);
    }

    render_position_gauge(frame, chunks[3], app);
    render_details(frame, chunks[5], app);
}

fn render_position_gauge(frame: &mut Frame, area: Rect, app: &App) {
    let ratio = if app.duration > 0.0 {
        (app.position / app.duration).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(format_time(app.position));

    // Same 2-column padding as the status bar
    let padded = Rect {
        x: area.x + 2,
        width: area.width.saturating_sub(4),
        ..area
    };
    frame.render_widget(gauge, padded);
}

fn render_details(frame: &mut Frame, area: Rect, app: &App) {
    let file_text = if app.file_name.is_empty() {
        "-".to_string()
    } else {
        app.file_name.clone()
    };

    let region_text = match app.region_seconds() {
        Some((start, end)) => format!("{} - {}", format_time(start), format_time(end)),
        None => "-".to_string(),
    };

    let mark_text = match (app.pending_region_start, app.playback.sample_rate()) {
        (Some(frames), rate) if rate > 0 => format_time(frames as f64 / rate as f64),
        _ => "-".to_string(),
    };

    let analysis_text = match &app.analysis {
        AnalysisStatus::Idle => "idle".to_string(),
        AnalysisStatus::Running(percent) => format!("running {}%", percent),
        AnalysisStatus::Done { width, height } => format!("{} frames x {} bins", width, height),
        AnalysisStatus::Failed(reason) => format!("failed: {}", reason),
    };

    let lines = vec![
        Line::from(format!("  file: {}", file_text)),
        Line::from(format!("  region: {}", region_text)),
        Line::from(format!("  mark: {}", mark_text)),
        Line::from(""),
        Line::from(format!(
            "  spectrogram: {}; window: {}; colors: {}",
            analysis_text, app.params.window, app.params.color_map
        )),
        Line::from(format!(
            "  range: {:.0} - {:.0} Hz; dynamic range: {:.0} dB",
            app.params.min_frequency, app.params.max_frequency, app.params.dynamic_range
        )),
    ];

    frame.render_widget(Paragraph::new(lines), area);
}
