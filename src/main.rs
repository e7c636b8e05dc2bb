use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use heroreel::clip::load_clip_set;
use heroreel::player::{
    driver, BufferView, FadeCurve, LoadId, MediaEvent, SchedulerBuilder, SchedulerEvent,
    SchedulerEventHandler, SchedulerSnapshot,
};
use heroreel::utils::{format_timestamp, Config};

/// HeroReel - ambient background video scheduler
///
/// Runs the scheduler against a simulated media layer and logs the
/// resulting timeline.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Clip set JSON file
    #[arg(value_name = "CLIPS")]
    clips: Option<PathBuf>,

    /// Config file to use instead of the system and user files
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Shuffle the rotation
    #[arg(short, long)]
    randomize: bool,

    /// Crossfade length in milliseconds
    #[arg(long, value_name = "MS")]
    fade_ms: Option<u64>,

    /// Fade curve (linear, exponential, s_curve)
    #[arg(long, value_name = "CURVE")]
    curve: Option<String>,

    /// Honor skip requests
    #[arg(long)]
    skip_enabled: bool,

    /// Request a skip every N seconds
    #[arg(long, value_name = "SECS")]
    skip_every: Option<u64>,

    /// Seed for the shuffle RNG
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated natural length of every clip
    #[arg(long, value_name = "SECS", default_value = "8")]
    clip_secs: u64,

    /// Simulated time for a slot to become ready after a load
    #[arg(long, value_name = "MS", default_value = "300")]
    preload_ms: u64,

    /// Clip ids the simulated media layer fails to play
    #[arg(long = "fail", value_name = "ID")]
    failing: Vec<String>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS", default_value = "60")]
    run_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let mut config = Config::from_files(std::slice::from_ref(path))?;
            config.apply_env_overrides()?;
            config
        }
        None => Config::load()?,
    };
    apply_args(&mut config, &args)?;
    config.validate()?;

    // Initialize logging
    let log_level = if args.debug { "debug" } else { config.general.log_level.as_str() };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    info!("Starting HeroReel v{}", env!("CARGO_PKG_VERSION"));

    let clips_path = config
        .general
        .clips_path
        .clone()
        .context("No clip set given; pass a CLIPS file or set HEROREEL_CLIPS")?;
    let clips = load_clip_set(&clips_path)
        .with_context(|| format!("Failed to load clip set {:?}", clips_path))?;
    info!("Loaded {} clip records from {:?}", clips.len(), clips_path);

    let mut builder = SchedulerBuilder::new()
        .with_config(config.scheduler.clone())
        .with_event_handler(Box::new(LoggingEventHandler));
    if let Some(seed) = args.seed {
        builder = builder.with_seed(seed);
    }
    let handle = driver::spawn(builder.build()?);

    let mut snapshots = handle.snapshots();
    let mut content = handle.content();
    let (media_tx, mut media_rx) = mpsc::unbounded_channel();
    let mut media = SimulatedMedia::new(
        media_tx,
        Duration::from_millis(args.preload_ms),
        Duration::from_secs(args.clip_secs),
        args.failing.iter().cloned().collect(),
    );

    handle.replace_clips(clips)?;

    let stop = tokio::time::sleep(Duration::from_secs(args.run_secs));
    tokio::pin!(stop);
    let mut skips = args.skip_every.map(|secs| {
        tokio::time::interval_at(
            tokio::time::Instant::now() + Duration::from_secs(secs),
            Duration::from_secs(secs.max(1)),
        )
    });

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    error!("Scheduler task stopped unexpectedly");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                media.observe(&snapshot);
            }
            Some(event) = media_rx.recv() => {
                handle.media(event)?;
            }
            Ok(overlay) = content.recv() => {
                let at = format_timestamp(handle.elapsed());
                match overlay {
                    Some(overlay) => info!("[{}] Overlay: {} / {}", at, overlay.title, overlay.subtitle),
                    None => info!("[{}] Overlay: default", at),
                }
            }
            _ = next_skip(&mut skips), if skips.is_some() => {
                info!("Requesting skip");
                handle.skip()?;
            }
        }
    }

    media.abort_all();
    let scheduler = handle.shutdown().await?;
    info!(
        "Stopped after {} rebuild(s) at rotation index {}",
        scheduler.rebuilds(),
        scheduler.session().rotation_index()
    );

    Ok(())
}

fn apply_args(config: &mut Config, args: &Args) -> Result<()> {
    if let Some(clips) = &args.clips {
        config.general.clips_path = Some(clips.clone());
    }
    if args.randomize {
        config.scheduler.randomize = true;
    }
    if let Some(fade) = args.fade_ms {
        config.scheduler.fade_duration_ms = fade;
    }
    if let Some(curve) = &args.curve {
        config.scheduler.fade_curve = curve.parse::<FadeCurve>()?;
    }
    if args.skip_enabled || args.skip_every.is_some() {
        config.scheduler.manual_skip_enabled = true;
    }
    Ok(())
}

async fn next_skip(interval: &mut Option<tokio::time::Interval>) {
    if let Some(interval) = interval {
        interval.tick().await;
    }
}

/// Per-slot bookkeeping of the simulated media layer
#[derive(Default)]
struct SimulatedSlot {
    load: Option<LoadId>,
    playing: Option<(LoadId, u32)>,
    ready: Option<JoinHandle<()>>,
    ended: Option<JoinHandle<()>>,
}

impl SimulatedSlot {
    fn abort(&mut self) {
        for task in [self.ready.take(), self.ended.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

/// Stand-in for a browser's video elements
///
/// Reports `Ready` a fixed delay after each load and `Ended` a fixed clip
/// length after a slot starts playing. Replays restart the clock.
struct SimulatedMedia {
    events: mpsc::UnboundedSender<MediaEvent>,
    preload: Duration,
    clip_length: Duration,
    failing: HashSet<String>,
    slots: [SimulatedSlot; 2],
}

impl SimulatedMedia {
    fn new(
        events: mpsc::UnboundedSender<MediaEvent>,
        preload: Duration,
        clip_length: Duration,
        failing: HashSet<String>,
    ) -> Self {
        Self {
            events,
            preload,
            clip_length,
            failing,
            slots: Default::default(),
        }
    }

    fn observe(&mut self, snapshot: &SchedulerSnapshot) {
        for view in &snapshot.buffers {
            self.observe_slot(view);
        }
    }

    fn observe_slot(&mut self, view: &BufferView) {
        let state = &mut self.slots[view.slot.index()];
        let Some(clip_id) = &view.clip_id else {
            state.abort();
            *state = SimulatedSlot::default();
            return;
        };
        let fails = self.failing.contains(clip_id.as_str());

        if state.load != Some(view.load) {
            state.abort();
            state.load = Some(view.load);
            state.playing = None;

            let event = if fails {
                MediaEvent::failed(view.slot, view.load)
            } else {
                MediaEvent::ready(view.slot, view.load)
            };
            debug!("Simulating {:?} for '{}' in {:?}", event.kind, clip_id, self.preload);
            state.ready = Some(Self::after(self.events.clone(), self.preload, event));
        }

        let key = (view.load, view.play_count);
        if view.visible && !fails && state.playing != Some(key) {
            if let Some(task) = state.ended.take() {
                task.abort();
            }
            state.playing = Some(key);
            let event = MediaEvent::ended(view.slot, view.load);
            state.ended = Some(Self::after(self.events.clone(), self.clip_length, event));
        }
    }

    fn abort_all(&mut self) {
        for state in self.slots.iter_mut() {
            state.abort();
        }
    }

    fn after(events: mpsc::UnboundedSender<MediaEvent>, delay: Duration, event: MediaEvent) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(event).is_err() {
                warn!("Media event for slot {} dropped", event.slot);
            }
        })
    }
}

/// Event handler that logs events
struct LoggingEventHandler;

impl SchedulerEventHandler for LoggingEventHandler {
    fn handle_event(&mut self, event: &SchedulerEvent) {
        match event {
            SchedulerEvent::SessionStarted { rotation_len } => {
                info!("Session started ({} rotation entries)", rotation_len);
            }
            SchedulerEvent::SessionReset => info!("Session reset"),
            SchedulerEvent::ClipLoaded { slot, clip_id, .. } => {
                debug!("Slot {} loading '{}'", slot, clip_id);
            }
            SchedulerEvent::ClipReplayed { clip_id, play, .. } => {
                info!("Replaying '{}' (play {})", clip_id, play + 1);
            }
            SchedulerEvent::TransitionStarted { from, to, next_index } => {
                info!("Transition {} -> {} toward rotation index {}", from, to, next_index);
            }
            SchedulerEvent::FadeStarted { .. } => debug!("Fade started"),
            SchedulerEvent::TransitionCompleted { clip_id, rotation_index, .. } => {
                info!("Showing '{}' at rotation index {}", clip_id, rotation_index);
            }
            SchedulerEvent::AdvanceIgnored { trigger } => {
                debug!("Ignored {:?} during transition", trigger);
            }
        }
    }
}
