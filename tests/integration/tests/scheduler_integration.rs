//! Integration tests for the HeroReel scheduler
//!
//! These tests drive the async scheduler task end to end on a paused tokio
//! clock:
//! - Weighted rotation order as seen on screen
//! - Repeat counts, duration overrides and racing finish triggers
//! - Rebuilds in the middle of a crossfade
//! - Overlay content delivery

use anyhow::Result;
use heroreel::clip::load_clip_set;
use heroreel::player::{
    driver, AdvanceTrigger, OverlayContent, PlaybackState, SchedulerBuilder, SchedulerConfig,
    SchedulerEvent, SchedulerHandle, SlotIndex,
};
use heroreel_integration_tests::{clip, settle, titled, EventLog, MediaScript, TestFixture};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;

const FADE: Duration = Duration::from_millis(500);

fn start(config: SchedulerConfig, log: &EventLog) -> Result<SchedulerHandle> {
    let scheduler = SchedulerBuilder::new()
        .with_config(SchedulerConfig { fade_duration_ms: FADE.as_millis() as u64, ..config })
        .with_event_handler(log.handler())
        .build()?;
    Ok(driver::spawn(scheduler))
}

async fn next_content(
    rx: &mut broadcast::Receiver<Option<OverlayContent>>,
) -> Option<Option<OverlayContent>> {
    tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.ok()?.ok()
}

#[tokio::test(start_paused = true)]
async fn test_weighted_rotation_on_screen() -> Result<()> {
    let log = EventLog::new();
    let handle = start(SchedulerConfig::default(), &log)?;
    let script = MediaScript::new(&handle);

    handle.replace_clips(vec![clip("A").with_featured(2), clip("B"), clip("C")])?;
    settle().await;

    let first = script.snapshot();
    assert_eq!(first.state, PlaybackState::Playing);
    assert_eq!(first.rotation_len, 9);
    let mut on_screen = vec![first.buffers[first.visible.index()]
        .clip_id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_default()];

    for _ in 0..5 {
        script.advance(FADE).await?;
    }
    on_screen.extend(log.shown());

    assert_eq!(on_screen, vec!["B", "A", "C", "A", "B", "A"]);
    assert_eq!(script.snapshot().rotation_index, 5);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_repeat_count_holds_position() -> Result<()> {
    let log = EventLog::new();
    let handle = start(SchedulerConfig::default(), &log)?;
    let script = MediaScript::new(&handle);

    handle.replace_clips(vec![clip("loop").with_repeat_count(3), clip("next")])?;
    settle().await;
    script.ready_hidden().await?;

    for play in 1..=2 {
        script.end_visible().await?;
        let snapshot = script.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert_eq!(snapshot.rotation_index, 0);
        assert_eq!(snapshot.buffers[0].play_count, play);
    }

    script.end_visible().await?;
    assert_eq!(script.snapshot().state, PlaybackState::Transitioning);
    assert_eq!(script.snapshot().rotation_index, 0);

    sleep(FADE + Duration::from_millis(10)).await;
    assert_eq!(script.snapshot().rotation_index, 1);
    assert_eq!(log.count(|e| matches!(e, SchedulerEvent::ClipReplayed { .. })), 2);
    assert_eq!(log.shown(), vec!["next"]);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_duration_override_advances_once() -> Result<()> {
    let log = EventLog::new();
    let handle = start(SchedulerConfig::default(), &log)?;
    let script = MediaScript::new(&handle);

    handle.replace_clips(vec![clip("short").with_play_duration(5), clip("long")])?;
    settle().await;
    let first_load = script.snapshot().buffers[0].load;
    script.ready_hidden().await?;

    sleep(Duration::from_millis(4_900)).await;
    assert_eq!(script.snapshot().state, PlaybackState::Playing);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(script.snapshot().state, PlaybackState::Transitioning);

    sleep(FADE).await;
    let snapshot = script.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.rotation_index, 1);
    assert_eq!(snapshot.visible, SlotIndex::B);

    // The first clip's real end arrives late and refers to a superseded load.
    handle.media(heroreel::player::MediaEvent::ended(SlotIndex::A, first_load))?;
    sleep(Duration::from_secs(60)).await;

    assert_eq!(script.snapshot().rotation_index, 1);
    assert_eq!(log.count(|e| matches!(e, SchedulerEvent::TransitionStarted { .. })), 1);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_racing_triggers_collapse() -> Result<()> {
    let log = EventLog::new();
    let config = SchedulerConfig { manual_skip_enabled: true, ..Default::default() };
    let handle = start(config, &log)?;
    let script = MediaScript::new(&handle);

    handle.replace_clips(vec![clip("a").with_play_duration(3), clip("b")])?;
    settle().await;
    script.ready_hidden().await?;

    sleep(Duration::from_millis(3_100)).await;
    assert_eq!(script.snapshot().state, PlaybackState::Transitioning);

    script.end_visible().await?;
    handle.skip()?;
    settle().await;

    let snapshot = script.snapshot();
    assert_eq!(snapshot.rotation_index, 0);
    assert_eq!(snapshot.visible, SlotIndex::A);

    sleep(Duration::from_secs(10)).await;
    let snapshot = script.snapshot();
    assert_eq!(snapshot.rotation_index, 1);
    assert_eq!(snapshot.visible, SlotIndex::B);

    let ignored: Vec<AdvanceTrigger> = log
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SchedulerEvent::AdvanceIgnored { trigger } => Some(trigger),
            _ => None,
        })
        .collect();
    assert_eq!(ignored, vec![AdvanceTrigger::NaturalEnd, AdvanceTrigger::ManualSkip]);
    assert_eq!(log.count(|e| matches!(e, SchedulerEvent::TransitionCompleted { .. })), 1);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_rebuild_aborts_crossfade() -> Result<()> {
    let log = EventLog::new();
    let handle = start(SchedulerConfig::default(), &log)?;
    let script = MediaScript::new(&handle);

    handle.replace_clips(vec![clip("a").with_play_duration(2), clip("b")])?;
    settle().await;
    script.ready_hidden().await?;

    sleep(Duration::from_millis(2_200)).await;
    assert_eq!(script.snapshot().state, PlaybackState::Transitioning);

    handle.replace_clips(vec![clip("x"), clip("y"), clip("z")])?;
    settle().await;

    let snapshot = script.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.rotation_index, 0);
    assert_eq!(snapshot.rotation_len, 3);
    assert_eq!(snapshot.visible, SlotIndex::A);
    let visible = &snapshot.buffers[0];
    assert_eq!(visible.clip_id.as_ref().map(|id| id.as_str()), Some("x"));
    assert_eq!(visible.opacity, 1.0);
    assert_eq!(snapshot.buffers[1].clip_id.as_ref().map(|id| id.as_str()), Some("y"));
    assert_eq!(snapshot.buffers[1].opacity, 0.0);

    // Nothing from the old session fires.
    sleep(Duration::from_secs(10)).await;
    let snapshot = script.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.rotation_index, 0);
    assert!(log.shown().is_empty());
    assert_eq!(log.count(|e| *e == SchedulerEvent::SessionReset), 1);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_overlay_content_stream() -> Result<()> {
    let log = EventLog::new();
    let handle = start(SchedulerConfig::default(), &log)?;
    let script = MediaScript::new(&handle);
    let mut content = handle.content();

    handle.replace_clips(vec![titled("intro", "Welcome").with_repeat_count(2), clip("plain")])?;
    settle().await;
    let first = next_content(&mut content).await.flatten();
    assert_eq!(first.map(|c| c.title), Some("Welcome".to_string()));

    // A replay does not re-emit.
    script.ready_hidden().await?;
    script.end_visible().await?;
    assert!(next_content(&mut content).await.is_none());

    script.end_visible().await?;
    sleep(FADE + Duration::from_millis(10)).await;
    assert_eq!(next_content(&mut content).await, Some(None));

    script.advance(FADE).await?;
    let back = next_content(&mut content).await.flatten();
    assert_eq!(back.map(|c| c.subtitle), Some("Welcome subtitle".to_string()));

    // Emptying the clip set falls back to the default overlay.
    handle.replace_clips(Vec::new())?;
    settle().await;
    assert_eq!(next_content(&mut content).await, Some(None));
    let snapshot = script.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert!(snapshot.buffers.iter().all(|b| b.clip_id.is_none()));

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_randomize_toggle_rebuilds_on_change() -> Result<()> {
    let log = EventLog::new();
    let handle = start(SchedulerConfig::default(), &log)?;

    handle.replace_clips(vec![clip("a"), clip("b"), clip("c"), clip("d")])?;
    handle.set_randomize(false)?;
    settle().await;
    assert_eq!(log.count(|e| *e == SchedulerEvent::SessionReset), 0);

    handle.set_randomize(true)?;
    handle.set_randomize(true)?;
    settle().await;
    assert_eq!(log.count(|e| *e == SchedulerEvent::SessionReset), 1);
    assert_eq!(log.count(|e| matches!(e, SchedulerEvent::SessionStarted { .. })), 2);

    let scheduler = handle.shutdown().await?;
    assert!(scheduler.config().randomize);
    assert_eq!(scheduler.session().rotation().len(), 4);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_clip_set_from_file() -> Result<()> {
    let fixture = TestFixture::with_clips(&[
        clip("third").with_order(3),
        clip("first").with_order(1),
        clip("retired").with_active(false),
        clip("second").with_order(2),
    ])?;
    assert!(fixture.path().join("clips.json").exists());

    let log = EventLog::new();
    let handle = start(SchedulerConfig::default(), &log)?;
    let script = MediaScript::new(&handle);

    handle.replace_clips(load_clip_set(&fixture.clips_file)?)?;
    settle().await;

    let snapshot = script.snapshot();
    assert_eq!(snapshot.rotation_len, 3);
    assert_eq!(snapshot.buffers[0].clip_id.as_ref().map(|id| id.as_str()), Some("first"));
    assert_eq!(
        snapshot.buffers[0].source.as_deref(),
        Some("https://cdn.example.com/hero/first.mp4")
    );

    script.advance(FADE).await?;
    script.advance(FADE).await?;
    assert_eq!(log.shown(), vec!["second", "third"]);

    handle.shutdown().await?;
    Ok(())
}
