use super::super::VoiceSync;
use super::super::state::{MatchState, ScrollTarget};
use super::Effect;
use crate::aligner::{AlignMatch, Aligner};
use crate::speaker::{GateVerdict, SpeakerGate, SpeakerMarker};
use std::time::Instant;
use tracing::{debug, info, warn};

impl VoiceSync {
    /// Feed one batch of normalized words through the state machine.
    pub(in crate::sync) fn process_words(
        &mut self,
        words: &[String],
        is_final: bool,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        if self.index.is_empty() {
            return;
        }
        self.guard_desync();

        if self.gate.is_external() {
            self.match_external(words, is_final, now, effects);
            return;
        }

        if is_final {
            self.state.words.stage_final(words);
        }
        let utterance: &[String] = if is_final { &[] } else { words };
        let window = self
            .state
            .words
            .utterance_window(utterance, self.config.matching.window_words);
        if window.is_empty() {
            return;
        }

        match self.state.match_state {
            MatchState::Searching => self.match_searching(&window, is_final, now, effects),
            MatchState::Locked => self.match_locked(&window, utterance, is_final, now, effects),
        }

        if !self.gate.is_external() && self.state.match_state == MatchState::Locked {
            self.check_speaker_entry();
        }
    }

    fn match_searching(
        &mut self,
        window: &[String],
        is_final: bool,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let found = Aligner::new(&self.index, &self.config).global_search(window);
        match found {
            Some(found) => {
                match SpeakerGate::entry_crossed(self.index.markers(), None, found.element) {
                    Some(entry) => self.hand_off(entry, found.element, is_final),
                    None => self.lock_on(found, is_final, now, effects),
                }
            }
            None => {
                if self.debug.matching {
                    debug!(words = ?window, is_final, "No element above search threshold");
                }
                if is_final {
                    self.state.words.discard_pending();
                }
            }
        }
    }

    fn match_locked(
        &mut self,
        window: &[String],
        utterance: &[String],
        is_final: bool,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let Some(current) = self.state.current_element else {
            self.reset_to_searching("locked without a current element");
            return;
        };
        let found = Aligner::new(&self.index, &self.config).local_search(
            window,
            current,
            self.state.progress,
            self.state.no_match_near_end_count,
            self.state.word_pointer,
        );
        if self.debug.matching {
            debug!(
                current,
                words = ?window,
                is_final,
                found = ?found,
                "Local search"
            );
        }
        match found {
            Some(found) if found.element == current => {
                self.track_within(found, utterance, is_final, now)
            }
            Some(found) => {
                let crossed =
                    SpeakerGate::entry_crossed(self.index.markers(), Some(current), found.element);
                match crossed {
                    Some(entry) => self.hand_off(entry, found.element, is_final),
                    None => self.advance_to(found, is_final, now, effects),
                }
            }
            None => self.register_miss(is_final),
        }
    }

    /// Searching → Locked, or re-acquisition after an external segment.
    fn lock_on(&mut self, found: AlignMatch, is_final: bool, now: Instant, effects: &mut Vec<Effect>) {
        self.state.match_state = MatchState::Locked;
        self.state.epoch = self.index.epoch();
        self.state.enter_element(found.element);
        self.state.consecutive_misses = 0;
        self.state.no_match_near_end_count = 0;
        self.state.paused = false;
        self.state.progress = found.progress;
        if is_final {
            self.state.words.commit();
            self.state.word_pointer = self.pointer_for(found.element, found.progress);
        }
        self.controller.on_speech(now);
        self.controller.arm_jump();
        self.set_target(found.element, found.progress, found.confidence);
        self.push_element_jump(found.element, effects);
        info!(
            element = found.element,
            confidence = found.confidence,
            progress = found.progress,
            "Locked onto script position"
        );
    }

    fn track_within(&mut self, found: AlignMatch, utterance: &[String], is_final: bool, now: Instant) {
        let element = found.element;
        if self.state.paused {
            info!(
                element,
                misses = self.state.consecutive_misses,
                "Speech matched again; resuming scroll"
            );
        }
        self.state.consecutive_misses = 0;
        self.state.paused = false;

        let context = self
            .state
            .words
            .window(utterance, self.config.matching.progress_words);
        let computed = Aligner::new(&self.index, &self.config).alignment_progress(
            element,
            &context,
            self.state.word_pointer,
        );
        let progress = computed.max(self.state.progress);
        let moved = progress - self.state.progress;

        if is_final {
            self.state.words.commit();
            let pointer = self.pointer_for(element, progress);
            self.state.word_pointer = self.state.word_pointer.max(pointer);
            self.state.progress = progress;
            self.set_target(element, progress, found.confidence);
        } else if moved >= self.config.tracking.progress_hysteresis || self.state.target.is_none() {
            self.state.progress = progress;
            self.set_target(element, progress, found.confidence);
        }

        self.controller.on_speech(now);
        self.controller.arm_jump();
    }

    fn advance_to(&mut self, found: AlignMatch, is_final: bool, now: Instant, effects: &mut Vec<Effect>) {
        let from = self.state.current_element;
        self.state.enter_element(found.element);
        self.state.epoch = self.index.epoch();
        self.state.progress = found.progress;
        self.state.consecutive_misses = 0;
        self.state.no_match_near_end_count = 0;
        self.state.paused = false;
        if is_final {
            self.state.words.commit();
            self.state.word_pointer = self.pointer_for(found.element, found.progress);
        }
        self.controller.on_speech(now);
        self.controller.arm_jump();
        self.set_target(found.element, found.progress, found.confidence);
        self.push_element_jump(found.element, effects);
        info!(
            from = ?from,
            to = found.element,
            confidence = found.confidence,
            "Advanced to next script element"
        );
    }

    fn register_miss(&mut self, is_final: bool) {
        if is_final {
            self.state.words.discard_pending();
        }

        if self.state.progress > self.config.tracking.near_end_progress {
            self.state.no_match_near_end_count += 1;
            if self.state.no_match_near_end_count >= self.config.tracking.near_end_miss_limit {
                self.reset_to_searching("no match near end of element");
                return;
            }
        }

        if !is_final {
            return;
        }
        self.state.consecutive_misses += 1;
        if !self.state.paused {
            debug!(
                element = ?self.state.current_element,
                "Final result did not match; pausing scroll"
            );
        }
        self.state.paused = true;
        if self.state.consecutive_misses >= self.config.tracking.max_consecutive_misses {
            self.reset_to_searching("consecutive misses");
        }
    }

    fn match_external(
        &mut self,
        words: &[String],
        is_final: bool,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let skip = words.len().saturating_sub(self.config.matching.window_words);
        let window = &words[skip..];
        let start = self.gate.search_start();
        let (found, weak) = {
            let aligner = Aligner::new(&self.index, &self.config);
            let found = aligner.restricted_search(window, start);
            let weak = aligner.weak_candidate(window, self.gate.segment_start().unwrap_or(start));
            (found, weak)
        };

        if let Some(found) = found {
            info!(
                element = found.element,
                confidence = found.confidence,
                "Anchor text recognized after external segment"
            );
            self.gate.return_to_anchor();
            if is_final {
                self.state.words.stage_final(words);
            }
            self.lock_on(found, is_final, now, effects);
            return;
        }

        if self.debug.speaker {
            debug!(words = ?window, weak = ?weak, "Discarding external speech");
        }
        if let Some(candidate) = weak {
            if self.gate.observe_candidate(candidate.element) == GateVerdict::ForceReturn {
                self.gate.return_to_anchor();
                self.reset_to_searching("external segment without exit marker");
            }
        }
    }

    /// Speech matched text behind an entry marker: the external speaker has
    /// started. The held position stays where the anchor stopped.
    fn hand_off(&mut self, entry: SpeakerMarker, matched: usize, is_final: bool) {
        if is_final {
            self.state.words.discard_pending();
        }
        info!(
            element = ?self.state.current_element,
            matched,
            "Speech matched past an entry marker"
        );
        self.gate.enter(entry, self.index.markers());
        self.state.paused = true;
    }

    fn check_speaker_entry(&mut self) {
        let Some(current) = self.state.current_element else {
            return;
        };
        let entry = SpeakerGate::pending_entry(
            self.index.markers(),
            current,
            self.state.progress,
            self.config.tracking.near_end_progress,
        );
        if let Some(entry) = entry {
            self.gate.enter(entry, self.index.markers());
            self.state.paused = true;
        }
    }

    /// Reset to Searching if the held element no longer belongs to the
    /// current index.
    pub(in crate::sync) fn guard_desync(&mut self) {
        let Some(current) = self.state.current_element else {
            return;
        };
        if !self.index.is_valid_handle(self.state.epoch, current) {
            warn!(
                element = current,
                state_epoch = self.state.epoch,
                index_epoch = self.index.epoch(),
                "Held script position is stale"
            );
            self.gate.return_to_anchor();
            self.reset_to_searching("stale element handle");
        }
    }

    pub(in crate::sync) fn reset_to_searching(&mut self, reason: &str) {
        info!(
            reason,
            element = ?self.state.current_element,
            "Lost script position; searching"
        );
        self.state.reset(self.index.epoch());
    }

    fn pointer_for(&self, element: usize, progress: f32) -> usize {
        let total = self.index.element(element).map_or(0, |e| e.word_count());
        ((progress * total as f32).round() as usize).min(total)
    }

    fn set_target(&mut self, element: usize, progress: f32, confidence: f32) {
        let Some(target) = self.index.element(element) else {
            return;
        };
        self.state.target = Some(ScrollTarget {
            offset: target.offset_at(progress),
            element,
            progress,
            confidence,
        });
    }

    fn push_element_jump(&self, element: usize, effects: &mut Vec<Effect>) {
        if let Some(target) = self.index.element(element) {
            effects.push(Effect::MoveToOffset {
                offset: target.top,
                smooth: true,
                align_top: true,
            });
        }
    }
}
