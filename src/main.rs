//! Replays a recorded transcript against a plain-text script.
//!
//! Usage: `voicesync <script.txt> <transcript.jsonl> [config.toml]`
//!
//! `VOICESYNC_SPEAKER_MODE=external` starts with the external speaker.
//!
//! The script is laid out with a simple text model, the recording is fed
//! through the sync runtime on a virtual clock, and the final snapshot is
//! printed as JSON.

use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};
use voicesync::config::load_config;
use voicesync::runtime::{SimulatedScroller, SyncRuntime};
use voicesync::script::{PlainTextScript, ScriptLayout};
use voicesync::speaker::SpeakerMode;
use voicesync::sync::VoiceSync;
use voicesync::transcript::{RecordedTranscript, parse_recording};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const DEFAULT_CONFIG_PATH: &str = "conf/voicesync.toml";
/// Overrides `speaker.initial_mode` when set.
const SPEAKER_MODE_ENV: &str = "VOICESYNC_SPEAKER_MODE";
/// Time simulated after the last recorded event so the scroller settles.
const SETTLE_TIME: Duration = Duration::from_secs(3);

struct Args {
    script: PathBuf,
    transcript: PathBuf,
    config: PathBuf,
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args = parse_args()?;
    let mut config = load_config(&args.config);
    if let Ok(mode) = env::var(SPEAKER_MODE_ENV) {
        config.speaker.initial_mode = mode
            .parse::<SpeakerMode>()
            .with_context(|| format!("Invalid {SPEAKER_MODE_ENV}"))?;
    }
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        script = %args.script.display(),
        transcript = %args.transcript.display(),
        level = %config.log_level,
        "Starting transcript replay"
    );

    let text = fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read script {}", args.script.display()))?;
    let recording = fs::read_to_string(&args.transcript)
        .with_context(|| format!("Failed to read transcript {}", args.transcript.display()))?;
    let events = parse_recording(&recording)
        .with_context(|| format!("Malformed transcript {}", args.transcript.display()))?;

    let document = PlainTextScript::from_text(&text, ScriptLayout::default());
    let max_scroll = (document.total_height() - document.layout().viewport_height_px).max(0.0);
    let tick = config.velocity.tick;
    let sync = VoiceSync::new(config).context("Invalid sync configuration")?;
    let mut runtime = SyncRuntime::new(
        sync,
        document,
        SimulatedScroller::new(max_scroll),
        RecordedTranscript::default(),
    );

    let t0 = Instant::now();
    runtime.actuator_mut().advance(t0);
    if !runtime.start(t0) {
        warn!("Start deferred until the script is available");
    }

    let end = events.last().map_or(Duration::ZERO, |event| event.at) + SETTLE_TIME;
    let mut pending = events.into_iter().peekable();
    let mut elapsed = Duration::ZERO;
    while elapsed <= end {
        let now = t0 + elapsed;
        while let Some(event) = pending.next_if(|event| event.at <= elapsed) {
            runtime.push_transcript(event.event, t0 + event.at);
        }
        runtime.actuator_mut().advance(now);
        runtime.tick(now);
        elapsed += tick;
    }

    let snapshot = runtime.snapshot();
    info!(
        position = runtime.actuator().position(),
        restarts = runtime.transcript().restarts(),
        "Replay finished"
    );
    runtime.stop(t0 + elapsed);
    let rendered = serde_json::to_string_pretty(&snapshot).context("Failed to render snapshot")?;
    println!("{rendered}");
    Ok(())
}

fn parse_args() -> Result<Args> {
    let usage = || anyhow!("Usage: voicesync <script.txt> <transcript.jsonl> [config.toml]");
    let mut args = env::args().skip(1);
    let script = PathBuf::from(args.next().ok_or_else(usage)?);
    let transcript = PathBuf::from(args.next().ok_or_else(usage)?);
    let config = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    for path in [&script, &transcript] {
        ensure_exists(path)?;
    }
    Ok(Args {
        script,
        transcript,
        config,
    })
}

fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(anyhow!("File not found: {}", path.display()));
    }
    Ok(())
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
