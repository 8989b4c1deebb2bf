//! Multi-stage fermentation countdown.
//!
//! The engine is a plain value: control operations and ticks mutate it,
//! and the only side effect it produces is a [`StageEvent`] handed back to
//! the caller when a stage runs out. Anything that rings, pops up or talks
//! to the network lives with the caller.

use leaven_ipc::{Snapshot, Stage, TimerStatus};
use std::sync::Arc;
use tracing::{debug, info};

/// A named, ordered list of stages. Cloning shares the same frozen slice.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSequence {
    name: String,
    stages: Arc<[Stage]>,
}

impl StageSequence {
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            name: name.into(),
            stages: stages.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new("", Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn total_secs(&self) -> u64 {
        self.stages
            .iter()
            .fold(0, |acc, s| acc.saturating_add(s.duration_secs))
    }
}

impl Default for StageSequence {
    fn default() -> Self {
        Self::empty()
    }
}

/// Emitted once per transition into `StageComplete` or `AllComplete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageEvent {
    pub stage_index: usize,
    pub stage_name: String,
    pub sequence_name: String,
    pub is_final: bool,
}

impl StageEvent {
    pub fn title(&self) -> String {
        if self.is_final {
            format!("{} is ready", self.sequence_name)
        } else {
            format!("{} complete", self.stage_name)
        }
    }

    pub fn body(&self) -> String {
        if self.is_final {
            format!("All stages of {} are done.", self.sequence_name)
        } else {
            format!(
                "{} finished. Move on to the next stage of {}.",
                self.stage_name, self.sequence_name
            )
        }
    }
}

#[derive(Debug, Clone)]
pub struct StageTimerEngine {
    sequence: StageSequence,
    current_index: usize,
    remaining_secs: u64,
    status: TimerStatus,
}

impl StageTimerEngine {
    pub fn new(sequence: StageSequence) -> Self {
        let mut engine = Self {
            sequence: StageSequence::empty(),
            current_index: 0,
            remaining_secs: 0,
            status: TimerStatus::Idle,
        };
        engine.set_sequence(sequence);
        engine
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn sequence(&self) -> &StageSequence {
        &self.sequence
    }

    /// `None` while the sequence is empty.
    pub fn current_index(&self) -> Option<usize> {
        (!self.sequence.is_empty()).then_some(self.current_index)
    }

    pub fn current_stage(&self) -> Option<&Stage> {
        self.sequence.stages().get(self.current_index)
    }

    fn stage_duration(&self) -> u64 {
        self.current_stage().map_or(0, |s| s.duration_secs)
    }

    fn is_last_stage(&self) -> bool {
        self.current_index + 1 >= self.sequence.len()
    }

    /// Swap in a new sequence and discard any run in progress.
    pub fn set_sequence(&mut self, sequence: StageSequence) {
        info!(
            sequence = sequence.name(),
            stages = sequence.len(),
            "loading stage sequence"
        );
        self.sequence = sequence;
        self.reset_all();
    }

    pub fn start(&mut self) -> bool {
        if self.status != TimerStatus::Idle || self.sequence.is_empty() {
            debug!(status = ?self.status, "start ignored");
            return false;
        }
        self.remaining_secs = self.stage_duration();
        self.status = TimerStatus::Running;
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.status != TimerStatus::Running {
            debug!(status = ?self.status, "pause ignored");
            return false;
        }
        self.status = TimerStatus::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.status != TimerStatus::Paused {
            debug!(status = ?self.status, "resume ignored");
            return false;
        }
        self.status = TimerStatus::Running;
        true
    }

    /// Back to the full duration of the current stage, keeping the index.
    pub fn reset_stage(&mut self) -> bool {
        let changed =
            self.status != TimerStatus::Idle || self.remaining_secs != self.stage_duration();
        self.remaining_secs = self.stage_duration();
        self.status = TimerStatus::Idle;
        changed
    }

    pub fn reset_all(&mut self) -> bool {
        let first = self.sequence.stages().first().map_or(0, |s| s.duration_secs);
        let changed = self.current_index != 0
            || self.status != TimerStatus::Idle
            || self.remaining_secs != first;
        self.current_index = 0;
        self.remaining_secs = first;
        self.status = TimerStatus::Idle;
        changed
    }

    /// Advance out of `StageComplete` and keep running without an idle gap.
    pub fn next_stage(&mut self) -> bool {
        if self.status != TimerStatus::StageComplete || self.is_last_stage() {
            debug!(status = ?self.status, index = self.current_index, "next stage ignored");
            return false;
        }
        self.current_index += 1;
        self.remaining_secs = self.stage_duration();
        self.status = TimerStatus::Running;
        true
    }

    /// Consume one second. Returns an event when this tick finished a stage.
    pub fn tick(&mut self) -> Option<StageEvent> {
        if self.status != TimerStatus::Running {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return None;
        }

        let is_final = self.is_last_stage();
        self.status = if is_final {
            TimerStatus::AllComplete
        } else {
            TimerStatus::StageComplete
        };
        let event = StageEvent {
            stage_index: self.current_index,
            stage_name: self
                .current_stage()
                .map(|s| s.name.clone())
                .unwrap_or_default(),
            sequence_name: self.sequence.name().to_string(),
            is_final,
        };
        info!(
            stage = %event.stage_name,
            index = event.stage_index,
            is_final,
            "stage finished"
        );
        Some(event)
    }

    pub fn stage_progress(&self) -> f64 {
        let duration = self.stage_duration();
        if duration == 0 {
            return 0.0;
        }
        (duration - self.remaining_secs) as f64 / duration as f64
    }

    pub fn total_progress(&self) -> f64 {
        let total = self.sequence.total_secs();
        if total == 0 {
            return 0.0;
        }
        let completed = self.sequence.stages()[..self.current_index]
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.duration_secs));
        let elapsed = self.stage_duration() - self.remaining_secs;
        (completed.saturating_add(elapsed) as f64 / total as f64).min(1.0)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status,
            remaining_secs: self.remaining_secs,
            stage_duration_secs: self.stage_duration(),
            stage_progress: self.stage_progress(),
            total_progress: self.total_progress(),
            current_index: self.current_index(),
            stage_count: self.sequence.len(),
            stage_name: self.current_stage().map(|s| s.name.clone()),
            sequence_name: self.sequence.name().to_string(),
        }
    }
}

impl Default for StageTimerEngine {
    fn default() -> Self {
        Self::new(StageSequence::empty())
    }
}
