//! Timer schedules driven by simulation time.
//!
//! Emission, goal polling, the failure deadline and joy contagion all run as
//! timers on one queue. The engine drains due timers between particle passes,
//! so a callback never interleaves with a tick in progress, and halting a
//! run cancels its schedules before the next timer is drained.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use hecs::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Source pulse (repeating).
    Emission,
    /// Goal progress / victory poll (repeating).
    GoalCheck,
    /// Run fails when this fires (one-shot, re-armed on progress).
    FailureDeadline,
    /// Delayed happy mood for a neighbouring piece (one-shot).
    JoyContagion { target: Entity },
}

impl TimerKind {
    /// Schedules owned by a run; cancelled when the run halts.
    pub fn is_run_schedule(&self) -> bool {
        matches!(
            self,
            TimerKind::Emission | TimerKind::GoalCheck | TimerKind::FailureDeadline
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    due_ms: f64,
    seq: u64,
    kind: TimerKind,
    period_ms: Option<f64>,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Earliest due first; ties fire in scheduling order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.due_ms
            .total_cmp(&other.due_ms)
            .then(self.seq.cmp(&other.seq))
    }
}

/// A fired timer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fired {
    pub kind: TimerKind,
    pub due_ms: f64,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: TimerKind, due_ms: f64, period_ms: Option<f64>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled {
            due_ms,
            seq,
            kind,
            period_ms,
        }));
    }

    /// Fire once, `delay_ms` after `now_ms`.
    pub fn schedule_once(&mut self, now_ms: f64, delay_ms: f64, kind: TimerKind) {
        self.push(kind, now_ms + delay_ms, None);
    }

    /// Fire every `period_ms`, first at `now_ms + period_ms`. A period that
    /// is not positive fires once.
    pub fn schedule_repeating(&mut self, now_ms: f64, period_ms: f64, kind: TimerKind) {
        let period = (period_ms > 0.0).then_some(period_ms);
        self.push(kind, now_ms + period_ms, period);
    }

    /// Cancel every pending timer whose kind matches. Returns how many were dropped.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&TimerKind) -> bool) -> usize {
        let before = self.heap.len();
        self.heap.retain(|Reverse(t)| !pred(&t.kind));
        before - self.heap.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn has_pending(&self, mut pred: impl FnMut(&TimerKind) -> bool) -> bool {
        self.heap.iter().any(|Reverse(t)| pred(&t.kind))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn next_due(&self) -> Option<f64> {
        self.heap.peek().map(|Reverse(t)| t.due_ms)
    }

    /// Pop the earliest timer due at or before `now_ms`. Repeating timers are
    /// re-queued one period later.
    pub fn pop_due(&mut self, now_ms: f64) -> Option<Fired> {
        let due = matches!(self.heap.peek(), Some(Reverse(t)) if t.due_ms <= now_ms);
        if !due {
            return None;
        }
        let Reverse(timer) = self.heap.pop()?;
        if let Some(period) = timer.period_ms {
            self.push(timer.kind, timer.due_ms + period, Some(period));
        }
        Some(Fired {
            kind: timer.kind,
            due_ms: timer.due_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut TimerQueue, now: f64) -> Vec<(TimerKind, f64)> {
        let mut fired = Vec::new();
        while let Some(f) = queue.pop_due(now) {
            fired.push((f.kind, f.due_ms));
        }
        fired
    }

    #[test]
    fn test_fires_in_due_order() {
        let mut q = TimerQueue::new();
        q.schedule_once(0.0, 500.0, TimerKind::FailureDeadline);
        q.schedule_repeating(0.0, 100.0, TimerKind::GoalCheck);

        let fired = drain(&mut q, 250.0);
        assert_eq!(
            fired,
            vec![(TimerKind::GoalCheck, 100.0), (TimerKind::GoalCheck, 200.0)]
        );
        assert_eq!(q.next_due(), Some(300.0));
    }

    #[test]
    fn test_repeating_catches_up() {
        let mut q = TimerQueue::new();
        q.schedule_repeating(0.0, 1000.0, TimerKind::Emission);
        let fired = drain(&mut q, 3500.0);
        assert_eq!(fired.len(), 3);
        assert_eq!(fired[2].1, 3000.0);
    }

    #[test]
    fn test_ties_fire_in_schedule_order() {
        let mut q = TimerQueue::new();
        q.schedule_once(0.0, 100.0, TimerKind::FailureDeadline);
        q.schedule_once(0.0, 100.0, TimerKind::Emission);
        let fired = drain(&mut q, 100.0);
        assert_eq!(fired[0].0, TimerKind::FailureDeadline);
        assert_eq!(fired[1].0, TimerKind::Emission);
    }

    #[test]
    fn test_cancel_deadline_only() {
        let mut q = TimerQueue::new();
        q.schedule_once(0.0, 5000.0, TimerKind::FailureDeadline);
        q.schedule_repeating(0.0, 1000.0, TimerKind::Emission);
        assert_eq!(q.cancel_where(|k| *k == TimerKind::FailureDeadline), 1);
        assert!(!q.has_pending(|k| *k == TimerKind::FailureDeadline));
        assert_eq!(drain(&mut q, 2500.0).len(), 2);
    }

    #[test]
    fn test_non_positive_period_fires_once() {
        let mut q = TimerQueue::new();
        q.schedule_repeating(100.0, 0.0, TimerKind::GoalCheck);
        q.schedule_repeating(100.0, -10.0, TimerKind::Emission);
        let fired = drain(&mut q, 1000.0);
        assert_eq!(fired.len(), 2);
        assert!(q.is_empty());
    }

    #[test]
    fn test_cancel_run_schedules_keeps_contagion() {
        let mut world = hecs::World::new();
        let target = world.spawn((0u8,));

        let mut q = TimerQueue::new();
        q.schedule_repeating(0.0, 1000.0, TimerKind::Emission);
        q.schedule_repeating(0.0, 100.0, TimerKind::GoalCheck);
        q.schedule_once(0.0, 5000.0, TimerKind::FailureDeadline);
        q.schedule_once(0.0, 300.0, TimerKind::JoyContagion { target });

        assert_eq!(q.cancel_where(TimerKind::is_run_schedule), 3);
        assert_eq!(q.len(), 1);
        assert!(q.has_pending(|k| matches!(k, TimerKind::JoyContagion { .. })));
    }
}
