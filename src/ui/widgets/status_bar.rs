use ratatui::{
    layout::{Alignment, Rect},
    widgets::Paragraph,
    Frame,
};

use crate::app::{format_time, App};

/// Render the status bar
pub fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    // "state: {stopped|playing|paused}; time: {pos} / {dur}; vol: N%; loop: on|off"
    let loop_text = if app.playback.is_looping() { "on" } else { "off" };

    let status_text = format!(
        "  state: {}; time: {} / {}; vol: {:.0}%; loop: {}",
        app.status.as_str(),
        format_time(app.position),
        format_time(app.duration),
        app.playback.volume() * 100.0,
        loop_text
    );

    let status_widget = Paragraph::new(status_text).alignment(Alignment::Left);

    frame.render_widget(status_widget, area);
}
