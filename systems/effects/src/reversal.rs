use matrix_code_core::{CellOverride, ReversalTuning};
use matrix_code_grid::CellGrid;
use matrix_code_system_simulation::TimeScaleLink;

use crate::{Effect, EffectContext, EffectRequest};

const NAME: &str = "TimeReversal";

/// Stage of the time-reversal sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReversalPhase {
    /// Not running.
    Idle,
    /// Easing the time scale from 1 to 0.
    SlowDown,
    /// Holding the simulation frozen.
    Stop,
    /// Running the simulation backwards.
    Rewind,
    /// Handing off to a sibling effect and ramping back to normal speed.
    Reset,
}

/// Meta-effect that drives the simulation's playback rate through a
/// slow-down, freeze, rewind and recovery sequence.
///
/// It renders nothing itself. The rate is reached through a [`TimeScaleLink`]
/// handed over at construction, and the handoff to a sibling effect is queued
/// as an [`EffectRequest`] for the registry to resolve.
#[derive(Debug)]
pub struct TimeReversal {
    link: TimeScaleLink,
    phase: ReversalPhase,
    timer: u32,
    reset_from: f32,
}

impl TimeReversal {
    /// Creates an idle effect bound to the simulation's time scale.
    #[must_use]
    pub fn new(link: TimeScaleLink) -> Self {
        Self {
            link,
            phase: ReversalPhase::Idle,
            timer: 0,
            reset_from: 0.0,
        }
    }

    /// Current stage.
    #[must_use]
    pub const fn phase(&self) -> ReversalPhase {
        self.phase
    }

    fn enter(&mut self, phase: ReversalPhase) {
        tracing::debug!(effect = NAME, from = ?self.phase, to = ?phase, "reversal phase change");
        self.phase = phase;
        self.timer = 0;
    }
}

/// Shortest span in ticks that covers `distance` without exceeding `max_step` per tick.
fn ramp_ticks(distance: f32, max_step: f32) -> u32 {
    if max_step <= 0.0 || !max_step.is_finite() {
        return 1;
    }
    ((distance.abs() / max_step).ceil() as u32).max(1)
}

fn slowdown_ticks(tuning: &ReversalTuning) -> u32 {
    // A cubic ease-out starts with slope 3.
    tuning
        .slowdown_ticks
        .max(ramp_ticks(3.0, tuning.max_ramp_step))
}

fn rewind_ramp(tuning: &ReversalTuning) -> u32 {
    tuning
        .rewind_ramp_ticks
        .max(ramp_ticks(tuning.rewind_speed, tuning.max_ramp_step))
}

impl Effect for TimeReversal {
    fn name(&self) -> &str {
        NAME
    }

    fn is_active(&self) -> bool {
        self.phase != ReversalPhase::Idle
    }

    fn trigger(&mut self, _ctx: &mut EffectContext<'_>) -> bool {
        if self.phase != ReversalPhase::Idle {
            return false;
        }
        if !self.link.is_live() {
            tracing::warn!(effect = NAME, "simulation time scale is gone; trigger refused");
            return false;
        }
        self.enter(ReversalPhase::SlowDown);
        true
    }

    fn update(&mut self, ctx: &mut EffectContext<'_>, out: &mut Vec<EffectRequest>) {
        if self.phase == ReversalPhase::Idle {
            return;
        }
        let Some(scale) = self.link.upgrade() else {
            tracing::warn!(effect = NAME, "simulation time scale dropped mid-run");
            self.enter(ReversalPhase::Idle);
            return;
        };

        let tuning = &ctx.config.reversal;
        self.timer += 1;

        match self.phase {
            ReversalPhase::Idle => {}
            ReversalPhase::SlowDown => {
                let span = slowdown_ticks(tuning);
                let progress = (self.timer as f32 / span as f32).min(1.0);
                scale.set((1.0 - progress).powi(3));
                if self.timer >= span {
                    scale.set(0.0);
                    self.enter(ReversalPhase::Stop);
                }
            }
            ReversalPhase::Stop => {
                scale.set(0.0);
                if self.timer >= tuning.stop_ticks {
                    self.enter(ReversalPhase::Rewind);
                }
            }
            ReversalPhase::Rewind => {
                let ramp = rewind_ramp(tuning);
                let progress = (self.timer as f32 / ramp as f32).min(1.0);
                scale.set(tuning.rewind_speed * progress);
                if self.timer >= tuning.rewind_ticks.max(ramp) {
                    self.reset_from = scale.get();
                    self.enter(ReversalPhase::Reset);
                }
            }
            ReversalPhase::Reset => {
                if self.timer == 1 && !tuning.handoff.is_empty() {
                    out.push(EffectRequest::Trigger(tuning.handoff.clone()));
                }
                let span = ramp_ticks(1.0 - self.reset_from, tuning.max_ramp_step);
                let progress = (self.timer as f32 / span as f32).min(1.0);
                scale.set(self.reset_from + (1.0 - self.reset_from) * progress);
                if self.timer >= span {
                    scale.set(1.0);
                    self.enter(ReversalPhase::Idle);
                }
            }
        }
    }

    fn override_for(&self, _index: usize, _grid: &CellGrid) -> Option<CellOverride> {
        None
    }

    fn active_indices(&self, _grid: &CellGrid) -> Option<Vec<usize>> {
        Some(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_ticks_never_exceed_step() {
        assert_eq!(ramp_ticks(3.0, 0.5), 6);
        assert_eq!(ramp_ticks(-2.0, 0.05), 40);
        assert_eq!(ramp_ticks(0.0, 0.05), 1);
        assert_eq!(ramp_ticks(1.0, 0.0), 1);
    }

    #[test]
    fn slowdown_is_stretched_by_tight_ramp_limit() {
        let tuning = ReversalTuning {
            slowdown_ticks: 10,
            max_ramp_step: 0.01,
            ..ReversalTuning::default()
        };
        assert!(slowdown_ticks(&tuning) >= 300);
    }
}
