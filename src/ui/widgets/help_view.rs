use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// Render the help view
pub fn render_help_view(frame: &mut Frame, area: Rect) {
    let help_text = vec![
        Line::from(""),
        Line::from("  sonotate - audio playback and spectrogram analysis"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Transport", Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Line::from("    Space            Play / pause"),
        Line::from("    s                Stop and rewind"),
        Line::from("    ←→               Seek 1 second back / forward"),
        Line::from("    + / -            Volume up / down"),
        Line::from("    l                Toggle loop"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Region", Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Line::from("    [                Mark region start at cursor"),
        Line::from("    ]                Mark region end at cursor"),
        Line::from("    c                Clear region"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Spectrogram", Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Line::from("    a                Analyse the 10 s page under the cursor"),
        Line::from("    x                Cancel analysis"),
        Line::from("    e                Export last spectrogram as PNG"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Other", Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Line::from("    ?                Toggle this help"),
        Line::from("    q or Ctrl+c      Quit"),
        Line::from(""),
        Line::from("  Press any key to close"),
    ];

    let paragraph = Paragraph::new(help_text).alignment(Alignment::Left);

    frame.render_widget(paragraph, area);
}
