//! Headless Flipbook driver: inspect, preview, and export saved projects
//! from the command line.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

use flipbook_core::encoder::gif::{GifConfig, GifskiEncoder};
use flipbook_core::{
    AudioClip, Frame, PlaybackSink, PlaybackState, ProjectDocument, Studio, TokioScheduler,
};

/// Sink that narrates render instructions instead of compositing pixels.
struct TraceSink {
    frames_drawn: u64,
}

impl PlaybackSink for TraceSink {
    fn draw(&mut self, frame: &Frame) {
        self.frames_drawn += 1;
        info!(id = %frame.id, duration_ms = frame.duration_ms, "draw frame");
    }

    fn clear(&mut self) {
        info!("canvas idle");
    }

    fn play_audio(&mut self, clip: &AudioClip) {
        info!(mime = %clip.mime_type, bytes = clip.data.len(), "start frame audio");
    }
}

fn load_studio(path: &Path) -> Result<Studio> {
    let doc = ProjectDocument::load_from_file(path)
        .with_context(|| format!("failed to load project {}", path.display()))?;
    let mut studio = Studio::with_default_converter();
    let (mut scheduler, _rx) = TokioScheduler::new();
    let mut sink = TraceSink { frames_drawn: 0 };
    studio.load_project(doc, &mut scheduler, &mut sink);
    Ok(studio)
}

fn cmd_info(path: &Path) -> Result<()> {
    let studio = load_studio(path)?;
    let store = studio.store();
    println!("frames: {}", store.len());
    println!("global duration: {} ms", store.settings().global_duration_ms);
    println!("loop: {}", store.settings().loop_enabled);
    for (i, frame) in store.frames().iter().enumerate() {
        let audio = match &frame.audio {
            Some(clip) => format!("audio {}", clip.mime_type),
            None => "no audio".to_string(),
        };
        println!(
            "  [{i}] {} ms{} ({}, {})",
            frame.duration_ms,
            if frame.has_custom_duration { " (custom)" } else { "" },
            frame.image.mime_type,
            audio
        );
    }
    Ok(())
}

async fn cmd_play(path: &Path) -> Result<()> {
    let mut studio = load_studio(path)?;
    let (mut scheduler, mut rx) = TokioScheduler::new();
    let mut sink = TraceSink { frames_drawn: 0 };

    studio.play(&mut scheduler, &mut sink)?;
    info!("playing; press Ctrl-C to stop");

    loop {
        tokio::select! {
            token = rx.recv() => {
                let Some(token) = token else { break };
                studio.on_timer(token, &mut scheduler, &mut sink);
                if studio.playback().state() == PlaybackState::Idle {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                studio.stop(&mut scheduler, &mut sink);
                break;
            }
        }
    }

    info!(frames_drawn = sink.frames_drawn, "playback finished");
    Ok(())
}

fn cmd_export(path: &Path, out: Option<PathBuf>) -> Result<()> {
    let studio = load_studio(path)?;
    let mut encoder = GifskiEncoder::new(GifConfig::default());

    let mut last_percent = 0u32;
    let artifact = studio.export(&mut encoder, &mut |fraction| {
        let percent = (fraction * 100.0) as u32;
        if percent >= last_percent + 10 || percent == 100 {
            last_percent = percent;
            info!(percent, "export progress");
        }
    })?;

    let out = out.unwrap_or_else(|| PathBuf::from(&artifact.filename));
    std::fs::write(&out, &artifact.bytes)
        .with_context(|| format!("failed to write {}", out.display()))?;
    println!("wrote {} ({} bytes)", out.display(), artifact.bytes.len());
    Ok(())
}

fn usage() -> ! {
    eprintln!("usage: flipbook-studio <info|play|export> <project.json> [out.gif]");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,flipbook=debug".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let (Some(command), Some(path)) = (args.get(1), args.get(2)) else {
        usage();
    };
    let path = Path::new(path);

    match command.as_str() {
        "info" => cmd_info(path),
        "play" => cmd_play(path).await,
        "export" => cmd_export(path, args.get(3).map(PathBuf::from)),
        other => bail!("unknown command: {other}"),
    }
}
