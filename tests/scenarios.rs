use std::collections::VecDeque;
use std::time::{Duration, Instant};
use voicesync::config::SyncConfig;
use voicesync::error::{ConfigError, TranscriptError};
use voicesync::runtime::{ScrollActuator, SyncRuntime};
use voicesync::script::{DocumentNode, ScriptDocument};
use voicesync::speaker::SpeakerMode;
use voicesync::sync::{MatchState, VoiceSync};
use voicesync::transcript::{Hypothesis, TranscriptEvent, TranscriptSource};

#[derive(Debug, Default)]
struct StubDocument {
    nodes: Option<Vec<DocumentNode>>,
}

impl ScriptDocument for StubDocument {
    fn nodes(&self) -> Option<Vec<DocumentNode>> {
        self.nodes.clone()
    }

    fn offset_to_scroll_position(&self, offset: f32) -> f32 {
        offset
    }
}

#[derive(Debug)]
struct RecordingScroller {
    available: bool,
    acquired: bool,
    position: f32,
    velocities: Vec<f32>,
    moves: Vec<(f32, bool, bool)>,
    releases: usize,
}

impl RecordingScroller {
    fn available() -> Self {
        Self {
            available: true,
            acquired: false,
            position: 0.0,
            velocities: Vec::new(),
            moves: Vec::new(),
            releases: 0,
        }
    }

    fn last_velocity(&self) -> Option<f32> {
        self.velocities.last().copied()
    }
}

impl ScrollActuator for RecordingScroller {
    fn acquire(&mut self) -> bool {
        self.acquired = self.available;
        self.acquired
    }

    fn release(&mut self) {
        self.acquired = false;
        self.releases += 1;
    }

    fn set_velocity(&mut self, velocity: f32) {
        self.velocities.push(velocity);
    }

    fn move_to_offset(&mut self, position: f32, smooth: bool, align_top: bool) {
        self.position = position;
        self.moves.push((position, smooth, align_top));
    }

    fn current_position(&self) -> Option<f32> {
        self.acquired.then_some(self.position)
    }
}

#[derive(Debug, Default)]
struct FlakySource {
    attempts: usize,
    failures: VecDeque<TranscriptError>,
    stopped: bool,
}

impl TranscriptSource for FlakySource {
    fn restart(&mut self) -> Result<(), TranscriptError> {
        self.attempts += 1;
        match self.failures.pop_front() {
            Some(error) => Err(error),
            None => {
                self.stopped = false;
                Ok(())
            }
        }
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

type Runtime = SyncRuntime<StubDocument, RecordingScroller, FlakySource>;

const NEWS: &[&str] = &[
    "Welcome to the evening news",
    "Markets rallied sharply today",
    "Farmers expect heavy rain",
    "Schools reopen next monday",
    "Scientists discovered a comet",
    "Tonight we discuss climate policy",
    "Sports results follow soon",
];

const BROADCAST: &[&str] = &[
    "Now we go live to our reporter downtown",
    "(ABRE LINK)",
    "Thanks, the crowd here is enormous tonight",
    "(REPÓRTER DEVOLVE)",
    "Back in the studio the weather looks calm",
];

fn nodes(texts: &[&str]) -> Vec<DocumentNode> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| DocumentNode::new(*text, i as f32 * 400.0, 100.0))
        .collect()
}

fn runtime_with(texts: &[&str], config: SyncConfig) -> (Runtime, Instant) {
    let sync = VoiceSync::new(config).expect("valid config");
    let document = StubDocument {
        nodes: Some(nodes(texts)),
    };
    let mut runtime = SyncRuntime::new(
        sync,
        document,
        RecordingScroller::available(),
        FlakySource::default(),
    );
    let t0 = Instant::now();
    assert!(runtime.start(t0));
    (runtime, t0)
}

fn runtime(texts: &[&str]) -> (Runtime, Instant) {
    runtime_with(texts, SyncConfig::default())
}

fn at(t0: Instant, millis: u64) -> Instant {
    t0 + Duration::from_millis(millis)
}

fn say_final(runtime: &mut Runtime, text: &str, now: Instant) {
    runtime.push_transcript(
        TranscriptEvent::Result(vec![Hypothesis::final_text(text)]),
        now,
    );
}

fn say_interim(runtime: &mut Runtime, text: &str, now: Instant) {
    runtime.push_transcript(TranscriptEvent::Result(vec![Hypothesis::interim(text)]), now);
}

/// Tick every 50ms from `from` through `to`, inclusive.
fn tick_range(runtime: &mut Runtime, t0: Instant, from: u64, to: u64) {
    let mut millis = from;
    while millis <= to {
        runtime.tick(at(t0, millis));
        millis += 50;
    }
}

#[test]
fn interim_speech_locks_after_debounce() {
    let (mut runtime, t0) = runtime(&["Welcome to the show", "Today we discuss climate"]);
    say_interim(&mut runtime, "welcome to the", t0);
    runtime.tick(at(t0, 100));
    assert_eq!(runtime.snapshot().state, MatchState::Searching);

    runtime.tick(at(t0, 250));
    let snapshot = runtime.snapshot();
    assert_eq!(snapshot.state, MatchState::Locked);
    assert_eq!(snapshot.current_element_index, Some(0));
    let target = runtime.sync().state().target().expect("target set");
    assert!(target.confidence >= 0.20);
    assert_eq!(runtime.actuator().moves.first(), Some(&(0.0, true, true)));
}

#[test]
fn repeated_words_keep_progress() {
    let (mut runtime, t0) = runtime(&["Welcome to the show", "Today we discuss climate"]);
    say_final(&mut runtime, "welcome to", t0);
    assert_eq!(runtime.sync().state().word_pointer(), 2);

    say_final(&mut runtime, "welcome to", at(t0, 400));
    assert!(runtime.sync().state().word_pointer() >= 2);
    assert!(runtime.snapshot().progress >= 0.5);
}

#[test]
fn lookahead_window_includes_its_last_element() {
    let mut config = SyncConfig::default();
    config.matching.lookahead = 5;
    let (mut runtime, t0) = runtime_with(NEWS, config);
    say_final(&mut runtime, "welcome to the", t0);
    say_final(&mut runtime, "tonight we discuss climate", at(t0, 800));

    let snapshot = runtime.snapshot();
    assert_eq!(snapshot.current_element_index, Some(5));
    assert_eq!(snapshot.consecutive_misses, 0);
    assert!(!snapshot.paused);
    assert_eq!(runtime.actuator().moves.last(), Some(&(2000.0, true, true)));
}

#[test]
fn external_speaker_segment_holds_position() {
    let (mut runtime, t0) = runtime(BROADCAST);
    say_final(&mut runtime, "now we go live to our reporter downtown", t0);
    assert_eq!(runtime.snapshot().speaker_mode, SpeakerMode::External);

    let held = runtime.snapshot();
    say_final(&mut runtime, "thanks the crowd here is enormous tonight", at(t0, 500));
    tick_range(&mut runtime, t0, 550, 700);
    let during = runtime.snapshot();
    assert_eq!(during.speaker_mode, SpeakerMode::External);
    assert_eq!(during.current_element_index, held.current_element_index);
    assert_eq!(during.progress, held.progress);
    assert_eq!(runtime.actuator().last_velocity(), Some(0.0));

    say_final(&mut runtime, "back in the studio the weather looks calm", at(t0, 900));
    let after = runtime.snapshot();
    assert_eq!(after.speaker_mode, SpeakerMode::Anchor);
    assert_eq!(after.state, MatchState::Locked);
    assert_eq!(after.current_element_index, Some(2));
}

#[test]
fn reporter_can_take_over_mid_introduction() {
    let (mut runtime, t0) = runtime(BROADCAST);
    say_final(&mut runtime, "now we go live", t0);
    let held = runtime.snapshot();
    assert_eq!(held.speaker_mode, SpeakerMode::Anchor);
    assert_eq!(held.current_element_index, Some(0));

    say_final(&mut runtime, "thanks the crowd here is enormous tonight", at(t0, 500));
    tick_range(&mut runtime, t0, 550, 700);
    let during = runtime.snapshot();
    assert_eq!(during.speaker_mode, SpeakerMode::External);
    assert_eq!(during.current_element_index, Some(0));
    assert_eq!(during.progress, held.progress);
    assert_eq!(runtime.actuator().last_velocity(), Some(0.0));

    say_final(&mut runtime, "back in the studio the weather looks calm", at(t0, 900));
    assert_eq!(runtime.snapshot().speaker_mode, SpeakerMode::Anchor);
    assert_eq!(runtime.snapshot().current_element_index, Some(2));
}

#[test]
fn speaker_mode_names_are_validated() {
    let (mut runtime, t0) = runtime(NEWS);
    let err = runtime
        .set_speaker_mode_named("reporter", t0)
        .expect_err("unknown mode");
    assert_eq!(err, ConfigError::InvalidSpeakerMode("reporter".to_string()));
    assert_eq!(runtime.snapshot().speaker_mode, SpeakerMode::Anchor);

    runtime
        .set_speaker_mode_named("External", at(t0, 50))
        .expect("known mode");
    assert_eq!(runtime.snapshot().speaker_mode, SpeakerMode::External);
}

#[test]
fn no_motion_when_on_target() {
    let (mut runtime, t0) = runtime(&["Welcome to the show", "Today we discuss climate"]);
    say_final(&mut runtime, "today we", at(t0, 100));
    let target = runtime.sync().target_offset().expect("target set");

    runtime.actuator_mut().position = target;
    runtime.tick(at(t0, 150));
    assert_eq!(runtime.actuator().last_velocity(), Some(0.0));
    assert_eq!(runtime.snapshot().velocity, 0.0);

    runtime.actuator_mut().position = target - 200.0;
    runtime.tick(at(t0, 200));
    assert!(runtime.actuator().last_velocity().is_some_and(|v| v > 0.0));
}

#[test]
fn far_ahead_of_target_jumps_once() {
    let (mut runtime, t0) = runtime(&["Welcome to the show", "Today we discuss climate"]);
    say_final(&mut runtime, "today we", at(t0, 100));
    let target = runtime.sync().target_offset().expect("target set");

    runtime.actuator_mut().position = target + 2_000.0;
    runtime.tick(at(t0, 150));
    assert_eq!(runtime.actuator().moves.last(), Some(&(target, true, false)));
    let moves = runtime.actuator().moves.len();

    runtime.actuator_mut().position = target + 2_000.0;
    runtime.tick(at(t0, 200));
    assert_eq!(runtime.actuator().moves.len(), moves);
}

#[test]
fn start_waits_for_document_and_scroller() {
    let sync = VoiceSync::new(SyncConfig::default()).expect("valid config");
    let mut scroller = RecordingScroller::available();
    scroller.available = false;
    let mut runtime = SyncRuntime::new(sync, StubDocument::default(), scroller, FlakySource::default());
    let t0 = Instant::now();

    assert!(!runtime.start(t0));
    runtime.tick(at(t0, 50));
    assert!(runtime.is_start_pending());
    assert!(!runtime.snapshot().running);

    runtime.document_mut().nodes = Some(nodes(NEWS));
    runtime.tick(at(t0, 100));
    assert!(runtime.is_start_pending());
    assert_eq!(runtime.transcript().attempts, 0);

    runtime.actuator_mut().available = true;
    runtime.tick(at(t0, 150));
    assert!(!runtime.is_start_pending());
    assert!(runtime.snapshot().running);
    assert_eq!(runtime.snapshot().element_count, NEWS.len());
    assert_eq!(runtime.transcript().attempts, 1);
}

#[test]
fn stream_end_restarts_after_delay() {
    let (mut runtime, t0) = runtime(NEWS);
    assert_eq!(runtime.transcript().attempts, 1);

    runtime.push_transcript(TranscriptEvent::EndOfStream, t0);
    runtime.tick(at(t0, 100));
    assert_eq!(runtime.transcript().attempts, 1);
    runtime.tick(at(t0, 300));
    assert_eq!(runtime.transcript().attempts, 2);
    tick_range(&mut runtime, t0, 350, 1_000);
    assert_eq!(runtime.transcript().attempts, 2);
}

#[test]
fn failed_restart_retries_only_when_recoverable() {
    let (mut runtime, t0) = runtime(NEWS);
    runtime
        .transcript_mut()
        .failures
        .extend([TranscriptError::Network("offline".into()), TranscriptError::NotAllowed]);

    runtime.push_transcript(TranscriptEvent::Error(TranscriptError::NoSpeech), t0);
    runtime.tick(at(t0, 300));
    assert_eq!(runtime.transcript().attempts, 2);

    runtime.tick(at(t0, 600));
    assert_eq!(runtime.transcript().attempts, 3);

    tick_range(&mut runtime, t0, 650, 2_000);
    assert_eq!(runtime.transcript().attempts, 3);
    assert!(runtime.snapshot().running);
}

#[test]
fn edited_script_is_reindexed_after_it_settles() {
    let (mut runtime, t0) = runtime(NEWS);
    say_final(&mut runtime, "welcome to the evening news", t0);
    assert_eq!(runtime.snapshot().index_epoch, 1);

    tick_range(&mut runtime, t0, 50, 600);
    let mut edited = NEWS.to_vec();
    edited.insert(1, "Breaking story just in");
    runtime.document_mut().nodes = Some(nodes(&edited));

    tick_range(&mut runtime, t0, 650, 1_500);
    assert_eq!(runtime.snapshot().index_epoch, 1);
    assert_eq!(runtime.snapshot().state, MatchState::Locked);

    tick_range(&mut runtime, t0, 1_550, 2_000);
    let snapshot = runtime.snapshot();
    assert_eq!(snapshot.index_epoch, 2);
    assert_eq!(snapshot.element_count, NEWS.len() + 1);
    assert_eq!(snapshot.state, MatchState::Searching);
}

#[test]
fn synthetic_anchors_do_not_trigger_reindex() {
    let (mut runtime, t0) = runtime(NEWS);
    let mut with_anchor = nodes(NEWS);
    with_anchor.insert(
        2,
        DocumentNode {
            text: String::new(),
            top: 800.0,
            height: 0.0,
            synthetic: true,
        },
    );
    runtime.document_mut().nodes = Some(with_anchor);
    tick_range(&mut runtime, t0, 50, 3_000);
    assert_eq!(runtime.snapshot().index_epoch, 1);
}

#[test]
fn stop_releases_collaborators() {
    let (mut runtime, t0) = runtime(NEWS);
    say_final(&mut runtime, "welcome to the evening news", t0);
    runtime.stop(at(t0, 100));

    let snapshot = runtime.snapshot();
    assert!(!snapshot.running);
    assert_eq!(snapshot.state, MatchState::Searching);
    assert_eq!(runtime.actuator().last_velocity(), Some(0.0));
    assert_eq!(runtime.actuator().releases, 1);
    assert!(runtime.transcript().stopped);

    runtime.tick(at(t0, 150));
    assert_eq!(runtime.actuator().releases, 1);
}
