//! Periodic and one-shot task scheduling.
//!
//! The [`Scheduler`] owns two ordered sets: periodic tasks, re-armed after
//! every fire, and one-shot tasks, gone once fired. Both are keyed by a
//! caller-chosen [`Token`], which doubles as the cancellation handle. The
//! scheduler itself never invokes anything; the run loop drains what is
//! due, invokes, and hands periodic hooks back.
//!
//! ## Pass semantics
//!
//! A fire pass operates on the set of entries due at pass start:
//!
//! - Entries registered during the pass never fire in it.
//! - Canceling an entry already collected as due does not stop this
//!   pass's fire, but the entry is not re-armed afterwards.
//! - A one-shot is removed before its hook runs, so the hook can
//!   re-register under its own token without being considered already
//!   fired.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::time::Duration;

use crate::clock::Instant;
use crate::runtime::Context;

/// Caller-chosen identity for a task or binding.
///
/// Tokens are plain numbers; give each logical piece of work its own
/// constant. Registering under a token that is already live replaces the
/// previous entry, and [`cancel`](crate::Runtime::cancel) takes effect on
/// whatever the token currently names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

/// A scheduled task hook.
///
/// Receives the [`Context`], which carries the application state, the
/// pass timestamp, and the full registration surface.
pub type TaskHook<S> = Box<dyn FnMut(&mut Context<'_, S>) + 'static>;

struct PeriodicTask<S> {
    token: Token,
    every: Duration,
    last_fired: Instant,
    /// Empty only while this task's hook is out being invoked.
    hook: Option<TaskHook<S>>,
}

impl<S> PeriodicTask<S> {
    fn due_at(&self) -> Instant {
        self.last_fired.saturating_add(self.every)
    }
}

struct OneShotTask<S> {
    token: Token,
    at: Instant,
    hook: TaskHook<S>,
}

/// One entry drained from the scheduler for invocation.
pub(crate) struct DueTask<S> {
    pub(crate) token: Token,
    /// Whether to hand the hook back via [`Scheduler::finish_periodic`].
    pub(crate) rearm: bool,
    pub(crate) hook: TaskHook<S>,
}

/// Ordered task storage with earliest-deadline queries.
pub(crate) struct Scheduler<S> {
    periodic: Vec<PeriodicTask<S>>,
    oneshot: Vec<OneShotTask<S>>,
}

impl<S> Scheduler<S> {
    pub(crate) fn new() -> Self {
        Scheduler {
            periodic: Vec::new(),
            oneshot: Vec::new(),
        }
    }

    /// Insert or replace a periodic task.
    ///
    /// The task anchors at [`Instant::ZERO`], so its first fire happens as
    /// soon as the current time is at least one interval past the epoch.
    /// An interval of zero fires on every pass.
    pub(crate) fn insert_periodic(&mut self, token: Token, every: Duration, hook: TaskHook<S>) {
        self.remove(token);
        self.periodic.push(PeriodicTask {
            token,
            every,
            last_fired: Instant::ZERO,
            hook: Some(hook),
        });
    }

    /// Insert or replace a one-shot task firing at `at`.
    pub(crate) fn insert_oneshot(&mut self, token: Token, at: Instant, hook: TaskHook<S>) {
        self.remove(token);
        self.oneshot.push(OneShotTask { token, at, hook });
    }

    /// Remove whatever `token` names. Absent tokens are a no-op.
    pub(crate) fn cancel(&mut self, token: Token) {
        if self.remove(token) {
            log::trace!("canceled task {token:?}");
        }
    }

    fn remove(&mut self, token: Token) -> bool {
        let mut removed = false;
        if let Some(i) = self.periodic.iter().position(|t| t.token == token) {
            self.periodic.remove(i);
            removed = true;
        }
        if let Some(i) = self.oneshot.iter().position(|t| t.token == token) {
            self.oneshot.remove(i);
            removed = true;
        }
        removed
    }

    pub(crate) fn contains(&self, token: Token) -> bool {
        self.periodic.iter().any(|t| t.token == token)
            || self.oneshot.iter().any(|t| t.token == token)
    }

    /// The earliest deadline over every entry, or `None` when nothing is
    /// scheduled and the loop has nothing left to wait for.
    pub(crate) fn next_wake(&self) -> Option<Instant> {
        let periodic = self.periodic.iter().map(|t| t.due_at());
        let oneshot = self.oneshot.iter().map(|t| t.at);
        periodic.chain(oneshot).min()
    }

    /// Drain everything due at `now`: periodic tasks first, then one-shots,
    /// each group in registration order.
    ///
    /// Periodic entries keep their slot (emptied) so registration order and
    /// interval survive the pass; one-shot entries leave entirely.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<DueTask<S>> {
        let mut due = Vec::new();
        for task in self.periodic.iter_mut() {
            if task.due_at() <= now {
                if let Some(hook) = task.hook.take() {
                    due.push(DueTask {
                        token: task.token,
                        rearm: true,
                        hook,
                    });
                }
            }
        }
        let mut i = 0;
        while i < self.oneshot.len() {
            if self.oneshot[i].at <= now {
                let task = self.oneshot.remove(i);
                due.push(DueTask {
                    token: task.token,
                    rearm: false,
                    hook: task.hook,
                });
            } else {
                i += 1;
            }
        }
        due
    }

    /// Hand a periodic hook back after its invocation.
    ///
    /// Re-anchors `last_fired` to the pass timestamp, not to the missed
    /// deadline: under overload each periodic fires once per pass and the
    /// backlog is dropped. The hook is dropped instead of re-seated when
    /// the pass canceled the task or registered a replacement under the
    /// same token.
    pub(crate) fn finish_periodic(&mut self, token: Token, hook: TaskHook<S>, fired_at: Instant) {
        if let Some(slot) = self.periodic.iter_mut().find(|t| t.token == token) {
            if slot.hook.is_none() {
                slot.hook = Some(hook);
                slot.last_fired = fired_at;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> TaskHook<()> {
        Box::new(|_| {})
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn at_ms(n: u64) -> Instant {
        Instant::from_millis(n)
    }

    #[test]
    fn registering_twice_keeps_one_entry() {
        let mut sched: Scheduler<()> = Scheduler::new();
        sched.insert_periodic(Token(1), ms(100), noop());
        sched.insert_periodic(Token(1), ms(250), noop());

        assert_eq!(sched.periodic.len(), 1);
        assert_eq!(sched.periodic[0].every, ms(250));
        assert_eq!(sched.next_wake(), Some(at_ms(250)));
    }

    #[test]
    fn a_token_lives_in_at_most_one_set() {
        let mut sched: Scheduler<()> = Scheduler::new();
        sched.insert_periodic(Token(1), ms(100), noop());
        sched.insert_oneshot(Token(1), at_ms(40), noop());

        assert!(sched.periodic.is_empty());
        assert_eq!(sched.oneshot.len(), 1);

        sched.insert_periodic(Token(1), ms(100), noop());
        assert!(sched.oneshot.is_empty());
        assert_eq!(sched.periodic.len(), 1);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut sched: Scheduler<()> = Scheduler::new();
        sched.insert_oneshot(Token(9), at_ms(10), noop());
        sched.cancel(Token(9));
        sched.cancel(Token(9));
        sched.cancel(Token(404));
        assert!(sched.next_wake().is_none());
    }

    #[test]
    fn next_wake_is_the_earliest_deadline_across_sets() {
        let mut sched: Scheduler<()> = Scheduler::new();
        assert_eq!(sched.next_wake(), None);

        sched.insert_periodic(Token(1), ms(300), noop());
        sched.insert_oneshot(Token(2), at_ms(120), noop());
        assert_eq!(sched.next_wake(), Some(at_ms(120)));

        sched.cancel(Token(2));
        assert_eq!(sched.next_wake(), Some(at_ms(300)));
    }

    #[test]
    fn take_due_respects_deadlines_and_order() {
        let mut sched: Scheduler<()> = Scheduler::new();
        sched.insert_oneshot(Token(3), at_ms(50), noop());
        sched.insert_periodic(Token(1), ms(100), noop());
        sched.insert_periodic(Token(2), ms(500), noop());

        let due = sched.take_due(at_ms(100));
        let tokens: Vec<Token> = due.iter().map(|d| d.token).collect();
        // Periodic entries first in registration order, then one-shots.
        assert_eq!(tokens, vec![Token(1), Token(3)]);

        // The one-shot left the registry before any invocation happens.
        assert!(!sched.contains(Token(3)));
        // The periodic slot stays, waiting for its hook back.
        assert!(sched.contains(Token(1)));
    }

    #[test]
    fn zero_interval_is_due_on_every_pass() {
        let mut sched: Scheduler<()> = Scheduler::new();
        sched.insert_periodic(Token(1), Duration::ZERO, noop());

        let due = sched.take_due(Instant::ZERO);
        assert_eq!(due.len(), 1);
        for task in due {
            sched.finish_periodic(task.token, task.hook, Instant::ZERO);
        }
        assert_eq!(sched.take_due(Instant::ZERO).len(), 1);
    }

    #[test]
    fn finish_periodic_reanchors_to_fire_time() {
        let mut sched: Scheduler<()> = Scheduler::new();
        sched.insert_periodic(Token(1), ms(100), noop());

        // Fired late: the next deadline counts from the actual fire time,
        // so the missed cycles are dropped rather than replayed.
        let mut due = sched.take_due(at_ms(730));
        let task = due.pop().unwrap();
        sched.finish_periodic(task.token, task.hook, at_ms(730));

        assert_eq!(sched.next_wake(), Some(at_ms(830)));
        assert!(sched.take_due(at_ms(800)).is_empty());
    }

    #[test]
    fn cancel_during_pass_stops_the_rearm() {
        let mut sched: Scheduler<()> = Scheduler::new();
        sched.insert_periodic(Token(1), ms(100), noop());

        let mut due = sched.take_due(at_ms(100));
        let task = due.pop().unwrap();
        sched.cancel(Token(1));
        sched.finish_periodic(task.token, task.hook, at_ms(100));

        assert!(sched.periodic.is_empty());
        assert_eq!(sched.next_wake(), None);
    }

    #[test]
    fn reregistration_during_pass_supersedes_the_fired_hook() {
        let mut sched: Scheduler<()> = Scheduler::new();
        sched.insert_periodic(Token(1), ms(100), noop());

        let mut due = sched.take_due(at_ms(100));
        let task = due.pop().unwrap();
        sched.insert_periodic(Token(1), ms(900), noop());
        sched.finish_periodic(task.token, task.hook, at_ms(100));

        assert_eq!(sched.periodic.len(), 1);
        assert_eq!(sched.periodic[0].every, ms(900));
        // The replacement anchors at the epoch, not the old fire time.
        assert_eq!(sched.next_wake(), Some(at_ms(900)));
    }

    #[test]
    fn oneshot_may_rearm_itself_under_its_own_token() {
        let mut sched: Scheduler<()> = Scheduler::new();
        sched.insert_oneshot(Token(5), at_ms(10), noop());

        let due = sched.take_due(at_ms(10));
        assert_eq!(due.len(), 1);
        // What the hook itself would do mid-invocation:
        sched.insert_oneshot(Token(5), at_ms(20), noop());

        assert!(sched.contains(Token(5)));
        assert_eq!(sched.next_wake(), Some(at_ms(20)));
        // Not due again within the same pass timestamp.
        assert!(sched.take_due(at_ms(10)).is_empty());
    }
}
