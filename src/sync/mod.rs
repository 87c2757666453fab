//! The sync session: alignment state machine plus its velocity controller.
//!
//! All state lives on [`VoiceSync`]. Inputs arrive as [`Message`]s and the
//! session answers with [`Effect`]s for the runtime to execute; nothing in
//! here touches a collaborator directly.

mod messages;
mod state;
mod update;

pub use messages::Message;
pub use state::{MatchState, ScrollTarget, SyncSnapshot, SyncState};
pub use update::Effect;

use crate::config::{DebugFlags, SyncConfig};
use crate::error::ConfigError;
use crate::index::ReferenceIndex;
use crate::script::{DocumentNode, content_hash};
use crate::speaker::{MarkerTable, SpeakerGate};
use crate::tags::{BuiltinTagPattern, TagClassifier, TagPatternConfig};
use crate::velocity::VelocityController;
use state::{PendingDocumentChange, PendingInterim};
use std::time::Instant;
use tracing::info;

pub struct VoiceSync {
    pub(in crate::sync) config: SyncConfig,
    pub(in crate::sync) debug: DebugFlags,
    pub(in crate::sync) tags: TagClassifier,
    pub(in crate::sync) markers: MarkerTable,
    pub(in crate::sync) index: ReferenceIndex,
    pub(in crate::sync) nodes: Vec<DocumentNode>,
    pub(in crate::sync) next_epoch: u64,
    pub(in crate::sync) state: SyncState,
    pub(in crate::sync) gate: SpeakerGate,
    pub(in crate::sync) controller: VelocityController,
    pub(in crate::sync) running: bool,
    pub(in crate::sync) interim_request_id: u64,
    pub(in crate::sync) pending_interim: Option<PendingInterim>,
    pub(in crate::sync) restart_pending: bool,
    pub(in crate::sync) document_change: Option<PendingDocumentChange>,
    pub(in crate::sync) last_velocity: f32,
}

impl VoiceSync {
    /// Build a session from validated configuration.
    pub fn new(config: SyncConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let tags = TagClassifier::new(config.tags.clone())?;
        let markers = MarkerTable::new(
            &config.speaker.entry_markers,
            &config.speaker.exit_markers,
        )?;
        let mut controller = VelocityController::new(config.velocity.clone());
        controller.set_debug(config.debug.velocity);
        Ok(Self {
            debug: config.debug,
            gate: SpeakerGate::new(config.speaker.max_external_elements),
            tags,
            markers,
            index: ReferenceIndex::default(),
            nodes: Vec::new(),
            next_epoch: 0,
            state: SyncState::default(),
            controller,
            running: false,
            interim_request_id: 0,
            pending_interim: None,
            restart_pending: false,
            document_change: None,
            last_velocity: 0.0,
            config,
        })
    }

    pub fn update(&mut self, message: Message) -> Vec<Effect> {
        self.reduce(message)
    }

    /// Begin a session against the given document snapshot.
    ///
    /// The index is only rebuilt when the content changed since the last
    /// build.
    pub fn start(&mut self, nodes: &[DocumentNode], now: Instant) -> Vec<Effect> {
        if self.index.is_empty() || content_hash(nodes) != self.index.content_hash() {
            self.rebuild_index(nodes);
        }
        self.state.reset(self.index.epoch());
        self.gate.force_mode(self.config.speaker.initial_mode, 0);
        if !self.gate.is_external() {
            if let Some(entry) = SpeakerGate::leading_entry(self.index.markers()) {
                self.gate.enter(entry, self.index.markers());
            }
        }
        self.controller.reset(now);
        self.cancel_interim();
        self.restart_pending = false;
        self.document_change = None;
        self.last_velocity = 0.0;
        self.running = true;
        info!(
            elements = self.index.len(),
            epoch = self.index.epoch(),
            speaker_mode = %self.gate.mode(),
            "Voice sync started"
        );
        vec![Effect::SetVelocity(0.0)]
    }

    pub fn stop(&mut self) -> Vec<Effect> {
        if !self.running {
            return Vec::new();
        }
        self.running = false;
        self.cancel_interim();
        self.restart_pending = false;
        self.state.reset(self.index.epoch());
        self.gate.return_to_anchor();
        self.last_velocity = 0.0;
        info!("Voice sync stopped");
        vec![
            Effect::SetVelocity(0.0),
            Effect::ReleaseScroll,
            Effect::StopTranscript,
        ]
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Rebuild the reference index from `nodes`, invalidating every held
    /// position.
    pub fn rebuild_index(&mut self, nodes: &[DocumentNode]) {
        self.tags.invalidate();
        self.markers.invalidate();
        self.next_epoch += 1;
        self.index = ReferenceIndex::build(nodes, &mut self.tags, &mut self.markers, self.next_epoch);
        self.nodes = nodes.to_vec();
        self.document_change = None;
        self.cancel_interim();
        self.state.reset(self.index.epoch());
        self.gate.return_to_anchor();
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            running: self.running,
            state: self.state.match_state,
            speaker_mode: self.gate.mode(),
            current_element_index: self.state.current_element,
            progress: self.state.progress,
            velocity: self.last_velocity,
            paused: self.state.paused,
            consecutive_misses: self.state.consecutive_misses,
            element_count: self.index.len(),
            index_epoch: self.index.epoch(),
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Document offset the reading line should sit on, if any.
    pub fn target_offset(&self) -> Option<f32> {
        self.state.target.map(|target| target.offset)
    }

    pub fn debug_flags(&self) -> DebugFlags {
        self.debug
    }

    pub fn set_debug_flags(&mut self, flags: DebugFlags) {
        self.debug = flags;
        self.controller.set_debug(flags.velocity);
        info!(
            matching = flags.matching,
            velocity = flags.velocity,
            speaker = flags.speaker,
            "Updated debug logging toggles"
        );
    }

    pub fn tag_config(&self) -> &TagPatternConfig {
        self.tags.config()
    }

    pub fn set_tag_pattern_enabled(&mut self, pattern: BuiltinTagPattern, enabled: bool) {
        if self.tags.config().is_enabled(pattern) == enabled {
            return;
        }
        self.tags.set_pattern_enabled(pattern, enabled);
        self.after_tag_change();
    }

    pub fn add_tag_prefix(&mut self, prefix: &str) -> Result<(), ConfigError> {
        self.tags.add_custom_prefix(prefix)?;
        self.after_tag_change();
        Ok(())
    }

    pub fn remove_tag_prefix(&mut self, prefix: &str) -> bool {
        let removed = self.tags.remove_custom_prefix(prefix);
        if removed {
            self.after_tag_change();
        }
        removed
    }

    pub fn add_tag_pattern(&mut self, pattern: &str) -> Result<(), ConfigError> {
        self.tags.add_custom_pattern(pattern)?;
        self.after_tag_change();
        Ok(())
    }

    pub fn remove_tag_pattern(&mut self, pattern: &str) -> bool {
        let removed = self.tags.remove_custom_pattern(pattern);
        if removed {
            self.after_tag_change();
        }
        removed
    }

    fn after_tag_change(&mut self) {
        self.config.tags = self.tags.config().clone();
        if self.nodes.is_empty() {
            return;
        }
        let nodes = std::mem::take(&mut self.nodes);
        self.rebuild_index(&nodes);
    }

    pub(in crate::sync) fn cancel_interim(&mut self) {
        self.interim_request_id = self.interim_request_id.wrapping_add(1);
        self.pending_interim = None;
    }
}
