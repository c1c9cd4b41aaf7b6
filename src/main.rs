mod app;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sonotate::audio::{self, PlaybackEngine};
use sonotate::config::Config;
use sonotate::spectrogram::SpectrogramEngine;

use crate::app::App;
use crate::ui::{handle_input, render_ui};

/// sonotate - audio playback and spectrogram analysis
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Terminal audio player with region looping and spectrogram analysis",
    long_about = "Terminal audio player with region looping and spectrogram analysis.\n\n\
                  Plays a WAV file with pause/seek/volume/loop and bounded region \
                  looping, and computes spectrogram images in the background.\n\n\
                  Configuration is loaded from sonotate.yaml by default, or use --config \
                  to specify a different file."
)]
struct Args {
    /// WAV file to open
    #[arg(value_name = "FILE", required_unless_present = "list_devices")]
    file: Option<PathBuf>,

    /// List available audio output devices
    #[arg(short, long)]
    list_devices: bool,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Initial playback region in seconds
    #[arg(short, long, num_args = 2, value_names = ["START", "END"])]
    region: Option<Vec<f64>>,

    /// Start with loop enabled
    #[arg(long = "loop")]
    loop_enabled: bool,

    /// Initial volume (0.0 - 1.0)
    #[arg(short, long)]
    volume: Option<f32>,
}

/// Send log output to a file so it does not draw over the terminal UI
fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();

    Ok(())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Handle --list-devices flag
    if args.list_devices {
        list_all_devices()?;
        return Ok(());
    }

    // Load configuration
    let config = Config::load(args.config.as_deref())?;
    init_logging(&config.log_path())?;
    log::info!("sonotate starting up");

    let file = args
        .file
        .clone()
        .context("No input file given")?;
    let store = Arc::new(audio::load_wav_file(&file)?);

    let playback = PlaybackEngine::with_default_output(config.playback.buffer_frames);
    let mut app = App::new(playback, SpectrogramEngine::new(), config.spectrogram.clone());

    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    app.load(store, file_name);

    apply_initial_settings(&mut app, &args, &config);

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    log::info!("sonotate shutting down");
    result
}

/// Command-line flags override the config file
fn apply_initial_settings(app: &mut App, args: &Args, config: &Config) {
    app.playback
        .set_volume(args.volume.unwrap_or(config.playback.volume));
    app.playback
        .set_loop(args.loop_enabled || config.playback.loop_enabled);

    if let Some(&[start, end]) = args.region.as_deref() {
        // Rejected regions are reported through the event bus
        let _ = app.playback.set_region_seconds(start, end);
    }
}

/// List all available audio output devices
fn list_all_devices() -> Result<()> {
    println!("sonotate - available devices");
    println!("============================");
    println!();

    println!("Audio Output Devices:");
    match audio::device::list_output_devices() {
        Ok(devices) => {
            if devices.is_empty() {
                println!("  No audio output devices found");
            } else {
                for (i, device) in devices.iter().enumerate() {
                    let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
                    println!(
                        "  [{}] {} - {}ch @ {}Hz{}",
                        i, device.name, device.max_output_channels, device.sample_rate, default_marker
                    );
                }
            }
        }
        Err(e) => {
            println!("  Error: {}", e);
        }
    }

    println!();
    println!("Configuration:");
    println!("  Create a sonotate.yaml file to configure playback and analysis");
    println!("  Use --config <path> to specify a different config file");
    println!();
    println!("Example sonotate.yaml:");
    println!("  playback:");
    println!("    volume: 0.8");
    println!("    loop: false");
    println!("    buffer_frames: 256");
    println!();
    println!("  spectrogram:");
    println!("    time_step: 0.005");
    println!("    time_window: 0.025");
    println!("    window: Hamming");
    println!("    max_frequency: 8000");
    println!("    dynamic_range: 70");
    println!("    color_map: Viridis");
    println!();
    println!("  log_file: sonotate.log");

    Ok(())
}

/// Main application loop
fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        // Pull notifications from both engines
        app.process_events();

        // Update message display (auto-clear expired messages)
        app.update_message();

        // Render UI
        terminal.draw(|frame| render_ui(frame, app))?;

        // Handle input
        handle_input(app)?;

        // Check for quit
        if app.should_quit() {
            break;
        }
    }

    Ok(())
}
