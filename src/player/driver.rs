//! Async driver for the background scheduler
//!
//! Runs a [`BackgroundScheduler`] on a tokio task. The task owns the
//! scheduler outright: registry pushes, media events and skips arrive on an
//! unbounded command channel, timers are served from one `sleep_until` on
//! the earliest pending deadline, and buffer views are published on a
//! `watch` channel (every frame while a fade is running). Overlay content is
//! fanned out on a `broadcast` channel.
//!
//! Logical time is measured from the instant the driver was spawned.

use crate::clip::ClipRecord;
use crate::internal_error;
use crate::player::content::OverlayContent;
use crate::player::scheduler::BackgroundScheduler;
use crate::player::{MediaEvent, SchedulerSnapshot};
use crate::utils::error::Result;
use log::{debug, info};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const CONTENT_CHANNEL_CAPACITY: usize = 16;

/// Command sent to the scheduler task
#[derive(Debug, Clone)]
pub enum SchedulerCommand {
    /// New registry snapshot; always rebuilds
    ReplaceClips(Vec<ClipRecord>),

    /// Shuffle toggle; rebuilds only on change
    SetRandomize(bool),

    /// Event reported by the media layer
    Media(MediaEvent),

    /// External skip request
    Skip,

    /// Stop the task and hand the scheduler back
    Shutdown,
}

/// Handle to a running scheduler task
pub struct SchedulerHandle {
    command_tx: mpsc::UnboundedSender<SchedulerCommand>,
    snapshots: watch::Receiver<SchedulerSnapshot>,
    content_tx: broadcast::Sender<Option<OverlayContent>>,
    epoch: Instant,
    task: JoinHandle<BackgroundScheduler>,
}

/// Move `scheduler` onto a new tokio task
///
/// Must be called from within a tokio runtime.
pub fn spawn(mut scheduler: BackgroundScheduler) -> SchedulerHandle {
    let epoch = Instant::now();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshots) = watch::channel(scheduler.snapshot(Duration::ZERO));
    let (content_tx, _) = broadcast::channel(CONTENT_CHANNEL_CAPACITY);

    let fan_out = content_tx.clone();
    let subscription = scheduler.subscribe_content(move |content| {
        // No receivers is fine; the overlay may not be mounted yet.
        let _ = fan_out.send(content.cloned());
    });

    let task = tokio::spawn(async move {
        let scheduler = run(scheduler, command_rx, snapshot_tx, epoch).await;
        drop(subscription);
        scheduler
    });

    info!("Scheduler task started");
    SchedulerHandle {
        command_tx,
        snapshots,
        content_tx,
        epoch,
        task,
    }
}

impl SchedulerHandle {
    /// Push a fresh registry snapshot
    pub fn replace_clips(&self, clips: Vec<ClipRecord>) -> Result<()> {
        self.send(SchedulerCommand::ReplaceClips(clips))
    }

    pub fn set_randomize(&self, randomize: bool) -> Result<()> {
        self.send(SchedulerCommand::SetRandomize(randomize))
    }

    /// Forward a media layer event
    pub fn media(&self, event: MediaEvent) -> Result<()> {
        self.send(SchedulerCommand::Media(event))
    }

    pub fn skip(&self) -> Result<()> {
        self.send(SchedulerCommand::Skip)
    }

    /// Receiver for scheduler snapshots
    pub fn snapshots(&self) -> watch::Receiver<SchedulerSnapshot> {
        self.snapshots.clone()
    }

    /// Receiver for overlay content; only sees emissions after this call
    pub fn content(&self) -> broadcast::Receiver<Option<OverlayContent>> {
        self.content_tx.subscribe()
    }

    /// Logical time of the scheduler
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Stop the task and take the scheduler back
    pub async fn shutdown(self) -> Result<BackgroundScheduler> {
        // The task may already have stopped if every sender was dropped.
        let _ = self.command_tx.send(SchedulerCommand::Shutdown);
        self.task
            .await
            .map_err(|e| internal_error!("Scheduler task failed: {}", e))
    }

    fn send(&self, command: SchedulerCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| internal_error!("Scheduler task is not running"))
    }
}

async fn run(
    mut scheduler: BackgroundScheduler,
    mut commands: mpsc::UnboundedReceiver<SchedulerCommand>,
    snapshots: watch::Sender<SchedulerSnapshot>,
    epoch: Instant,
) -> BackgroundScheduler {
    loop {
        let wake = next_wake(&scheduler, epoch.elapsed());

        tokio::select! {
            command = commands.recv() => {
                let now = epoch.elapsed();
                match command {
                    Some(SchedulerCommand::Shutdown) | None => break,
                    Some(command) => step(&mut scheduler, command, now),
                }
            }
            _ = tokio::time::sleep_until(epoch + wake.unwrap_or_default()), if wake.is_some() => {}
        }

        let now = epoch.elapsed();
        fire_due(&mut scheduler, now);
        snapshots.send_replace(scheduler.snapshot(now));
    }

    info!("Scheduler task stopped");
    scheduler
}

/// Apply `command` against the state as of `now`
///
/// Timers that came due while the command was queued fire first.
fn step(scheduler: &mut BackgroundScheduler, command: SchedulerCommand, now: Duration) {
    fire_due(scheduler, now);
    apply(scheduler, command, now);
}

fn fire_due(scheduler: &mut BackgroundScheduler, now: Duration) {
    while scheduler.next_deadline().is_some_and(|deadline| deadline <= now) {
        scheduler.tick(now);
    }
}

fn apply(scheduler: &mut BackgroundScheduler, command: SchedulerCommand, now: Duration) {
    debug!("Scheduler command: {:?}", command);
    match command {
        SchedulerCommand::ReplaceClips(clips) => scheduler.replace_clips(&clips, now),
        SchedulerCommand::SetRandomize(randomize) => {
            scheduler.set_randomize(randomize, now);
        }
        SchedulerCommand::Media(event) => scheduler.handle_media(event, now),
        SchedulerCommand::Skip => {
            scheduler.request_skip(now);
        }
        SchedulerCommand::Shutdown => {}
    }
}

/// Earliest of the armed deadline and, mid-fade, the next frame
fn next_wake(scheduler: &BackgroundScheduler, now: Duration) -> Option<Duration> {
    let frame = scheduler
        .session()
        .is_fading()
        .then(|| now + scheduler.config().frame_interval());

    match (scheduler.next_deadline(), frame) {
        (Some(deadline), Some(frame)) => Some(deadline.min(frame)),
        (deadline, frame) => deadline.or(frame),
    }
}
