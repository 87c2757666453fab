use super::super::VoiceSync;
use super::super::state::MatchState;
use super::Effect;
use crate::velocity::ControlInput;
use std::time::Instant;

impl VoiceSync {
    pub(in crate::sync) fn handle_tick(
        &mut self,
        now: Instant,
        current_position: Option<f32>,
        target_position: Option<f32>,
        effects: &mut Vec<Effect>,
    ) {
        if !self.running {
            return;
        }
        let Some(current) = current_position else {
            return;
        };

        let target = self.state.target;
        let active = self.state.match_state == MatchState::Locked
            && !self.state.paused
            && !self.gate.is_external()
            && target.is_some()
            && target_position.is_some();

        let output = self.controller.tick(ControlInput {
            now,
            current,
            target: target_position.unwrap_or(current),
            confidence: target.map_or(0.0, |t| t.confidence),
            active,
        });

        if output.jump {
            if let Some(target) = target {
                effects.push(Effect::MoveToOffset {
                    offset: target.offset,
                    smooth: true,
                    align_top: false,
                });
            }
        }
        self.last_velocity = output.velocity;
        effects.push(Effect::SetVelocity(output.velocity));
    }
}
