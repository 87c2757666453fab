use super::super::VoiceSync;
use super::super::messages::Message;
use super::super::state::{PendingDocumentChange, PendingInterim};
use super::Effect;
use crate::error::TranscriptError;
use crate::normalizer::normalize;
use crate::script::{DocumentNode, content_hash};
use crate::speaker::SpeakerMode;
use crate::transcript::{TranscriptEvent, split_result};
use std::time::Instant;
use tracing::{debug, info, warn};

impl VoiceSync {
    pub(in crate::sync) fn reduce(&mut self, message: Message) -> Vec<Effect> {
        let mut effects = Vec::new();

        match message {
            Message::Transcript { event, now } => {
                self.handle_transcript_event(event, now, &mut effects)
            }
            Message::InterimDue { request_id, now } => {
                self.handle_interim_due(request_id, now, &mut effects)
            }
            Message::RestartDue { now } => self.handle_restart_due(now, &mut effects),
            Message::RestartFailed { error, now } => {
                self.handle_stream_error(error, now, &mut effects)
            }
            Message::DocumentPolled { nodes, now } => self.handle_document_polled(nodes, now),
            Message::Tick {
                now,
                current_position,
                target_position,
            } => self.handle_tick(now, current_position, target_position, &mut effects),
            Message::SetSpeakerMode(mode) => self.handle_set_speaker_mode(mode),
        }

        effects
    }

    fn handle_transcript_event(
        &mut self,
        event: TranscriptEvent,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        if !self.running {
            return;
        }
        match event {
            TranscriptEvent::Result(hypotheses) => {
                let (final_text, interim_text) = split_result(&hypotheses);
                if !final_text.is_empty() {
                    // A final supersedes whatever interim was waiting.
                    self.cancel_interim();
                    let words = normalize(&final_text);
                    if !words.is_empty() {
                        self.process_words(&words, true, now, effects);
                    }
                }
                if !interim_text.is_empty() {
                    self.schedule_interim(normalize(&interim_text), now, effects);
                }
            }
            TranscriptEvent::EndOfStream => {
                debug!("Transcript stream ended");
                self.schedule_restart(now, effects);
            }
            TranscriptEvent::Error(error) => self.handle_stream_error(error, now, effects),
        }
    }

    fn schedule_interim(&mut self, words: Vec<String>, now: Instant, effects: &mut Vec<Effect>) {
        if words.is_empty() {
            return;
        }
        if let Some(pending) = self.pending_interim.as_mut() {
            pending.words = words;
            return;
        }
        self.interim_request_id = self.interim_request_id.wrapping_add(1);
        let request_id = self.interim_request_id;
        let due = now + self.config.transcript.interim_debounce;
        self.pending_interim = Some(PendingInterim {
            request_id,
            words,
            due,
        });
        effects.push(Effect::ScheduleInterim { request_id, due });
    }

    fn handle_interim_due(&mut self, request_id: u64, now: Instant, effects: &mut Vec<Effect>) {
        let current = self.pending_interim.as_ref().map(|pending| pending.request_id);
        if current != Some(request_id) {
            debug!(request_id, ?current, "Ignoring stale interim result");
            return;
        }
        let Some(pending) = self.pending_interim.take() else {
            return;
        };
        self.process_words(&pending.words, false, now, effects);
    }

    fn handle_stream_error(&mut self, error: TranscriptError, now: Instant, effects: &mut Vec<Effect>) {
        if !self.running {
            return;
        }
        if error.is_expected() {
            debug!(%error, "Transcript stream interrupted");
        } else {
            warn!(%error, "Transcript source error");
        }
        if error.is_recoverable() {
            self.schedule_restart(now, effects);
        }
    }

    fn schedule_restart(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if !self.running || self.restart_pending {
            return;
        }
        self.restart_pending = true;
        effects.push(Effect::ScheduleRestart {
            due: now + self.config.transcript.restart_delay,
        });
    }

    fn handle_restart_due(&mut self, _now: Instant, effects: &mut Vec<Effect>) {
        if !self.restart_pending {
            return;
        }
        self.restart_pending = false;
        if self.running {
            debug!("Restarting transcript stream");
            effects.push(Effect::RestartTranscript);
        }
    }

    fn handle_document_polled(&mut self, nodes: Vec<DocumentNode>, now: Instant) {
        if !self.running {
            return;
        }
        let hash = content_hash(&nodes);
        if hash == self.index.content_hash() {
            if self.document_change.take().is_some() {
                debug!("Script change reverted before debounce elapsed");
            }
            return;
        }

        let settled = match self.document_change.as_ref() {
            Some(change) if change.hash == hash => {
                now.saturating_duration_since(change.since)
                    >= self.config.transcript.document_debounce
            }
            _ => {
                self.document_change = Some(PendingDocumentChange { hash, since: now });
                false
            }
        };

        if settled {
            info!(
                previous_epoch = self.index.epoch(),
                "Script content changed; rebuilding index"
            );
            self.rebuild_index(&nodes);
        }
    }

    fn handle_set_speaker_mode(&mut self, mode: SpeakerMode) {
        if mode == self.gate.mode() {
            return;
        }
        let search_start = self.state.current_element.map_or(0, |element| element + 1);
        self.gate.force_mode(mode, search_start);
        self.state.paused = mode == SpeakerMode::External;
        info!(%mode, search_start, "Speaker mode set manually");
    }
}
