//! Goal tracking - fill milestones, the goal-reached latch and the adaptive
//! failure deadline.

use crate::components::{GoalMeter, Piece};
use crate::systems::events::{EventSink, SimEvent};

/// Fraction of goal capacity that counts as reached.
pub const GOAL_THRESHOLD: f32 = 0.95;

/// Fill percentages reported as they are crossed.
pub const MILESTONES: [u8; 4] = [25, 50, 75, 95];

/// Run-wide goal state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GoalState {
    reached: bool,
}

impl GoalState {
    pub fn is_reached(&self) -> bool {
        self.reached
    }

    pub fn reset(&mut self) {
        self.reached = false;
    }

    /// Report the goal's energy after an absorption. Emits one milestone event
    /// per threshold crossed since the last report. Returns `true` only on
    /// the report that first reaches the goal threshold.
    pub fn record(&mut self, goal: &Piece, meter: &mut GoalMeter, events: &mut dyn EventSink) -> bool {
        let fill = goal.fill_fraction();
        for percent in MILESTONES {
            let threshold = f32::from(percent) / 100.0;
            if meter.last_fill < threshold && fill >= threshold {
                events.emit(SimEvent::GoalMilestone { percent });
            }
        }
        meter.last_fill = fill;

        if self.reached || goal.energy < goal.max_energy * GOAL_THRESHOLD {
            return false;
        }
        self.reached = true;
        events.emit(SimEvent::GoalReached { fill });
        true
    }
}

/// Failure deadline that moves out whenever the goal is seen gaining energy.
///
/// Armed at `initial_ms` past the start. Each poll that finds the goal
/// holding more energy than at the previous poll pushes the deadline to
/// `extension_ms` past that poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunWatchdog {
    initial_ms: f64,
    extension_ms: f64,
    deadline_ms: f64,
    last_goal_energy: f32,
    progress_count: u32,
}

impl RunWatchdog {
    pub fn new(initial_ms: f64, extension_ms: f64) -> Self {
        Self {
            initial_ms,
            extension_ms,
            deadline_ms: initial_ms,
            last_goal_energy: 0.0,
            progress_count: 0,
        }
    }

    /// Start watching a run that begins at `now_ms`. Returns the deadline.
    pub fn arm(&mut self, now_ms: f64) -> f64 {
        self.last_goal_energy = 0.0;
        self.progress_count = 0;
        self.deadline_ms = now_ms + self.initial_ms;
        self.deadline_ms
    }

    /// Poll the goal. Returns `true` when it gained energy since the last
    /// poll, in which case the deadline has moved.
    pub fn observe(&mut self, now_ms: f64, goal_energy: f32) -> bool {
        if goal_energy <= self.last_goal_energy {
            return false;
        }
        self.last_goal_energy = goal_energy;
        self.progress_count += 1;
        self.deadline_ms = now_ms + self.extension_ms;
        true
    }

    pub fn deadline_ms(&self) -> f64 {
        self.deadline_ms
    }

    pub fn is_expired(&self, now_ms: f64) -> bool {
        now_ms >= self.deadline_ms
    }

    pub fn progress_count(&self) -> u32 {
        self.progress_count
    }
}
