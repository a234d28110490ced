//! pcm-render: render a song on the background worker and export it as WAVE.

use std::sync::mpsc;
use std::time::Instant;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use pcm_render::audio::read_window_checked;
use pcm_render::cli::Cli;
use pcm_render::config::RenderConfig;
use pcm_render::generation::{GenerationCoordinator, ToneRenderer};
use pcm_render::types::ToneSong;

fn main() {
    let config = RenderConfig::from_env();
    init_logging(&config);

    if let Err(e) = run(&config) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` wins over the config.
fn init_logging(config: &RenderConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(config: &RenderConfig) -> anyhow::Result<()> {
    if let Some(reason) = config.validate() {
        bail!("invalid configuration: {}", reason);
    }

    let cli = Cli::parse_args();
    let song = ToneSong::from_file(&cli.song)?;
    let options = cli.render_options()?;
    let track_id = cli.track_id(config);
    let output_path = cli.output_path(config);

    tracing::info!(
        song = %cli.song.display(),
        notes = song.notes.len(),
        bpm = song.bpm,
        length_sec = song.length_sec() + options.tail_sec,
        "rendering"
    );

    let coordinator = GenerationCoordinator::with_track_id(ToneRenderer::new(), track_id)?;
    let start_time = Instant::now();

    let (tx, rx) = mpsc::channel();
    coordinator.generate(&song, &options, move |progress, _, id| {
        tx.send((progress, id)).ok();
    })?;

    // The observer is dropped when the run ends, which closes the channel.
    let mut last_decile = None;
    let mut completed = false;
    for (progress, id) in rx {
        let percent = (progress * 100.0) as u32;
        if last_decile != Some(percent / 10) {
            tracing::info!(track_id = id, "progress: {}%", percent);
            last_decile = Some(percent / 10);
        }
        if progress >= 1.0 {
            completed = true;
            break;
        }
    }
    if !completed {
        bail!("generation ended without a final buffer (see warnings above)");
    }

    let generation_time = start_time.elapsed().as_secs_f32();
    let buffer = coordinator.snapshot().unwrap_or_default();
    tracing::info!(
        frames = buffer.frames(),
        duration_sec = buffer.duration_sec(),
        generation_time_sec = generation_time,
        "generation complete"
    );

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
    }

    let wave = coordinator.create_wave()?;
    wave.write_to(&output_path)?;
    tracing::info!(bytes = wave.len(), path = %output_path.display(), "saved");

    if let Some(t) = cli.peek {
        let window = read_window_checked(Some(&buffer), t, cli.frames)?;
        let line: Vec<String> = window.iter().map(|v| format!("{:.5}", v)).collect();
        println!("{}", line.join(" "));
    }

    Ok(())
}
