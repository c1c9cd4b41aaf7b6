use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::{App, SEEK_STEP_SECONDS, VOLUME_STEP};
use sonotate::types::UI_TICK_INTERVAL;

/// Handle keyboard input
///
/// Waits at most one UI tick so engine notifications keep flowing.
pub fn handle_input(app: &mut App) -> anyhow::Result<()> {
    if event::poll(UI_TICK_INTERVAL)? {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                handle_key_event(app, key);
            }
        }
    }

    Ok(())
}

/// Handle a key event
fn handle_key_event(app: &mut App, key: KeyEvent) {
    // Any key closes help
    if app.show_help && key.code != KeyCode::Char('q') {
        app.toggle_help();
        return;
    }

    match key.code {
        // Quit
        KeyCode::Char('q') => {
            app.quit();
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.quit();
        }

        // Transport
        KeyCode::Char(' ') => {
            app.toggle_play();
        }
        KeyCode::Char('s') => {
            app.stop();
        }
        KeyCode::Left => {
            app.seek_relative(-SEEK_STEP_SECONDS);
        }
        KeyCode::Right => {
            app.seek_relative(SEEK_STEP_SECONDS);
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            app.change_volume(VOLUME_STEP);
        }
        KeyCode::Char('-') => {
            app.change_volume(-VOLUME_STEP);
        }
        KeyCode::Char('l') => {
            app.toggle_loop();
        }

        // Region
        KeyCode::Char('[') => {
            app.mark_region_start();
        }
        KeyCode::Char(']') => {
            app.mark_region_end();
        }
        KeyCode::Char('c') => {
            app.clear_region();
        }

        // Spectrogram
        KeyCode::Char('a') => {
            app.analyse_visible();
        }
        KeyCode::Char('x') => {
            app.cancel_analysis();
        }
        KeyCode::Char('e') => {
            app.export_image();
        }

        // ? - toggle help
        KeyCode::Char('?') => {
            app.toggle_help();
        }

        _ => {}
    }
}
