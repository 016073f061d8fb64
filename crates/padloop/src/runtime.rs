//! The cooperative run loop.
//!
//! [`Runtime`] composes the scheduler, the input router, and the three
//! board collaborators (clock, delay, input source) into a single
//! sleep/wake loop. Each iteration fires due tasks, polls input on its
//! own cadence, computes the earliest upcoming deadline, and blocks until
//! then. With nothing scheduled and nothing to poll, the loop simply
//! returns.
//!
//! ## Hooks
//!
//! Everything user-provided runs as a hook: a closure or fn item taking
//! [`Context`], which carries the application state, the pass timestamp,
//! and the same registration surface as the runtime itself. Hooks run to
//! completion; there is no preemption, no isolation, and nothing catches
//! a panicking hook.
//!
//! ## Example
//!
//! ```
//! use core::time::Duration;
//! use padloop::{Clock, Instant, InputSource, Runtime, Token};
//! # use padloop::{Axis, ButtonId};
//! use embedded_hal::delay::DelayNs;
//!
//! // A board where time only moves when the loop sleeps.
//! #[derive(Default)]
//! struct TestTimer(std::rc::Rc<std::cell::Cell<u64>>);
//! impl Clock for TestTimer {
//!     fn now(&mut self) -> Instant { Instant::from_micros(self.0.get()) }
//! }
//! impl DelayNs for TestTimer {
//!     fn delay_ns(&mut self, ns: u32) {
//!         self.0.set(self.0.get() + (u64::from(ns) + 999) / 1_000);
//!     }
//! }
//! struct NoInput;
//! impl InputSource for NoInput {
//!     fn claim(&mut self, _: ButtonId) -> bool { false }
//!     fn is_pressed(&mut self, _: ButtonId) -> bool { false }
//!     fn pad_bits(&mut self) -> u8 { 0 }
//!     fn claim_axis(&mut self, _: Axis) -> bool { false }
//!     fn read_axis(&mut self, _: Axis) -> u16 { 0 }
//! }
//!
//! let timer = TestTimer::default();
//! let mut rt = Runtime::new(TestTimer(timer.0.clone()), timer, NoInput);
//!
//! const GREET: Token = Token(1);
//! let mut fired_at = Instant::ZERO;
//! rt.after(GREET, Duration::from_millis(250), |cx| {
//!     *cx.state = cx.now();
//! });
//! rt.run(&mut fired_at);
//!
//! assert_eq!(fired_at, Instant::from_millis(250));
//! ```

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::axis::{Axis, AxisConfig};
use crate::button::{Action, ButtonId};
use crate::clock::{Clock, Instant};
use crate::error::BindError;
use crate::interface::InputSource;
use crate::router::{Dispatch, Edges, InputRouter};
use crate::scheduler::{Scheduler, Token};

/// How often the loop polls input while any binding or watched axis
/// exists.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// [`run`](Runtime::run) has not been entered yet.
    Idle,
    /// Inside [`run`](Runtime::run).
    Running,
    /// [`run`](Runtime::run) returned. Terminal: a halted runtime stays
    /// halted.
    Stopped,
}

/// What hooks see while they run.
///
/// Carries the application state, the timestamp of the current pass, and
/// the full registration surface, so a hook can re-arm itself, schedule
/// or cancel other work, bind combos, and read input state.
pub struct Context<'a, S> {
    /// The application state passed to [`Runtime::run`].
    pub state: &'a mut S,
    now: Instant,
    sched: &'a mut Scheduler<S>,
    router: &'a mut InputRouter<S>,
    source: &'a mut dyn InputSource,
    halted: &'a mut bool,
}

impl<'a, S: 'static> Context<'a, S> {
    /// Timestamp of the current fire or poll pass.
    ///
    /// Stable for the whole pass: every hook fired by one pass sees the
    /// same value.
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Ask the loop to stop. It finishes the current pass, skips the
    /// sleep, and returns.
    pub fn halt(&mut self) {
        *self.halted = true;
    }

    /// Register `hook` to run on every pass.
    pub fn tick(&mut self, token: Token, hook: impl FnMut(&mut Context<'_, S>) + 'static) {
        self.sched.insert_periodic(token, Duration::ZERO, Box::new(hook));
    }

    /// Register `hook` to run every `every`. Replaces whatever `token`
    /// currently names.
    pub fn every(
        &mut self,
        token: Token,
        every: Duration,
        hook: impl FnMut(&mut Context<'_, S>) + 'static,
    ) {
        self.sched.insert_periodic(token, every, Box::new(hook));
    }

    /// Register `hook` to run once at the absolute time `at`.
    pub fn at(&mut self, token: Token, at: Instant, hook: impl FnMut(&mut Context<'_, S>) + 'static) {
        self.sched.insert_oneshot(token, at, Box::new(hook));
    }

    /// Register `hook` to run once, `delay` after the current pass
    /// timestamp.
    ///
    /// This is how a one-shot re-arms itself: its entry is already gone
    /// by the time it runs, so scheduling under its own token is a fresh
    /// registration, not an overwrite.
    pub fn after(
        &mut self,
        token: Token,
        delay: Duration,
        hook: impl FnMut(&mut Context<'_, S>) + 'static,
    ) {
        self.sched.insert_oneshot(token, self.now + delay, Box::new(hook));
    }

    /// Cancel whatever `token` names: a task, or the first binding
    /// registered under it. Unknown tokens are a no-op.
    ///
    /// A task that was already due when this pass started still fires in
    /// this pass; the cancellation takes hold afterwards.
    pub fn cancel(&mut self, token: Token) {
        self.sched.cancel(token);
        self.router.cancel(token);
    }

    /// Bind `hook` to a button combo. See [`Runtime::on`].
    ///
    /// A binding registered mid-dispatch joins after the current dispatch
    /// pass finishes.
    pub fn on(
        &mut self,
        token: Token,
        buttons: &[ButtonId],
        action: Action,
        hook: impl FnMut(&mut Context<'_, S>) -> Dispatch + 'static,
    ) -> Result<(), BindError> {
        self.router.bind(&mut *self.source, token, buttons, action, Box::new(hook))
    }

    /// Start watching a joystick axis. See [`Runtime::watch_axis`].
    pub fn watch_axis(&mut self, axis: Axis, config: AxisConfig) {
        self.router.watch_axis(&mut *self.source, axis, config);
    }

    /// Latest normalized value of a watched axis; unwatched axes read as
    /// centered.
    pub fn axis(&self, axis: Axis) -> f32 {
        self.router.axis(axis)
    }

    /// Whether `button` is currently in the confirmed down-set.
    pub fn pressed(&self, button: ButtonId) -> bool {
        self.router.is_down(button)
    }

    /// Whether `token` currently names a scheduled task.
    ///
    /// A periodic task reads as scheduled from inside its own hook; a
    /// one-shot does not, unless the hook already re-armed it.
    pub fn scheduled(&self, token: Token) -> bool {
        self.sched.contains(token)
    }
}

/// The cooperative event loop.
///
/// ## Type Parameters
///
/// * `S` - Application state, passed mutably to every hook
/// * `C` - Monotonic clock implementing [`Clock`]
/// * `D` - Blocking wait implementing [`DelayNs`]
/// * `I` - Board input implementing [`InputSource`]
pub struct Runtime<S, C, D, I> {
    clock: C,
    delay: D,
    source: I,
    sched: Scheduler<S>,
    router: InputRouter<S>,
    halted: bool,
    status: Status,
    poll_every: Duration,
    next_poll: Instant,
}

impl<S, C, D, I> Runtime<S, C, D, I>
where
    S: 'static,
    C: Clock,
    D: DelayNs,
    I: InputSource,
{
    /// Create a runtime over the three board collaborators.
    pub fn new(clock: C, delay: D, source: I) -> Self {
        Runtime {
            clock,
            delay,
            source,
            sched: Scheduler::new(),
            router: InputRouter::new(),
            halted: false,
            status: Status::Idle,
            poll_every: DEFAULT_POLL_INTERVAL,
            next_poll: Instant::ZERO,
        }
    }

    /// Override the input poll cadence.
    pub fn with_poll_interval(mut self, every: Duration) -> Self {
        self.poll_every = every;
        self
    }

    /// Register `hook` to run on every pass.
    pub fn tick(&mut self, token: Token, hook: impl FnMut(&mut Context<'_, S>) + 'static) {
        self.sched.insert_periodic(token, Duration::ZERO, Box::new(hook));
    }

    /// Register `hook` to run every `every`.
    ///
    /// Replaces whatever `token` currently names. The first fire comes
    /// once the clock is at least one interval past [`Instant::ZERO`], so
    /// on a device whose clock has been counting for a while the task is
    /// due immediately.
    pub fn every(
        &mut self,
        token: Token,
        every: Duration,
        hook: impl FnMut(&mut Context<'_, S>) + 'static,
    ) {
        self.sched.insert_periodic(token, every, Box::new(hook));
    }

    /// Register `hook` to run once at the absolute time `at`.
    pub fn at(&mut self, token: Token, at: Instant, hook: impl FnMut(&mut Context<'_, S>) + 'static) {
        self.sched.insert_oneshot(token, at, Box::new(hook));
    }

    /// Register `hook` to run once, `delay` from now.
    pub fn after(
        &mut self,
        token: Token,
        delay: Duration,
        hook: impl FnMut(&mut Context<'_, S>) + 'static,
    ) {
        let at = self.clock.now() + delay;
        self.sched.insert_oneshot(token, at, Box::new(hook));
    }

    /// Cancel whatever `token` names: a task, or the first binding
    /// registered under it. Unknown tokens are a no-op.
    pub fn cancel(&mut self, token: Token) {
        self.sched.cancel(token);
        self.router.cancel(token);
    }

    /// Bind `hook` to a button combo.
    ///
    /// The hook fires on the poll where every button in `buttons` shows
    /// up in the same transition set: all freshly down for
    /// [`Action::Pressed`], all freshly up for [`Action::Released`].
    /// Bindings are evaluated in registration order and a hook returning
    /// [`Dispatch::Consumed`] stops the walk.
    ///
    /// Buttons referenced for the first time are claimed from the input
    /// source; a button the board refuses is logged and never matches,
    /// but the binding itself still registers.
    ///
    /// # Errors
    ///
    /// Rejects an empty combo or one naming the same button twice.
    pub fn on(
        &mut self,
        token: Token,
        buttons: &[ButtonId],
        action: Action,
        hook: impl FnMut(&mut Context<'_, S>) -> Dispatch + 'static,
    ) -> Result<(), BindError> {
        self.router.bind(&mut self.source, token, buttons, action, Box::new(hook))
    }

    /// Start watching a joystick axis with `config`.
    ///
    /// The axis is read on every input poll; hooks get the latest
    /// normalized value from [`Context::axis`]. Watching an axis already
    /// watched replaces its configuration.
    pub fn watch_axis(&mut self, axis: Axis, config: AxisConfig) {
        self.router.watch_axis(&mut self.source, axis, config);
    }

    /// Latest normalized value of a watched axis.
    pub fn axis(&self, axis: Axis) -> f32 {
        self.router.axis(axis)
    }

    /// Whether `button` is currently in the confirmed down-set.
    pub fn pressed(&self, button: ButtonId) -> bool {
        self.router.is_down(button)
    }

    /// Whether `token` currently names a scheduled task.
    pub fn scheduled(&self, token: Token) -> bool {
        self.sched.contains(token)
    }

    /// Ask the loop to stop before its next pass. Sticky: once halted,
    /// [`run`](Self::run) returns immediately.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    /// Where the loop currently is.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Drive the loop until nothing remains scheduled or a hook halts it.
    ///
    /// Each iteration: check the halt flag, fire every task due at the
    /// current time, poll input if the poll deadline elapsed, then sleep
    /// until the earliest upcoming deadline. When nothing is left to wait
    /// on (no tasks, no bindings, no watched axes) the loop stops; that
    /// is the normal way a program with only one-shot work finishes.
    pub fn run(&mut self, state: &mut S) {
        self.status = Status::Running;
        self.next_poll = Instant::ZERO;
        log::debug!("loop running, polling every {:?}", self.poll_every);
        loop {
            if self.halted {
                log::debug!("halt requested");
                break;
            }
            let now = self.clock.now();
            self.fire_pass(state, now);
            if self.router.wants_poll() && self.next_poll <= now {
                self.poll_pass(state, now);
                self.next_poll = now + self.poll_every;
            }
            if self.halted {
                log::debug!("halt requested");
                break;
            }
            let mut wake = self.sched.next_wake();
            if self.router.wants_poll() {
                let poll_at = self.next_poll;
                wake = Some(wake.map_or(poll_at, |w| w.min(poll_at)));
            }
            let Some(wake) = wake else {
                log::debug!("nothing scheduled, stopping");
                break;
            };
            self.sleep_until(wake);
        }
        self.status = Status::Stopped;
        log::debug!("loop stopped");
    }

    /// Register an initial one-shot at time zero, then [`run`](Self::run).
    pub fn run_with(
        &mut self,
        state: &mut S,
        token: Token,
        hook: impl FnMut(&mut Context<'_, S>) + 'static,
    ) {
        self.at(token, Instant::ZERO, hook);
        self.run(state);
    }

    /// Fire every task due at `now` over a snapshot drained up front, so
    /// work a hook schedules never runs in the pass that scheduled it.
    fn fire_pass(&mut self, state: &mut S, now: Instant) {
        let due = self.sched.take_due(now);
        for task in due {
            log::trace!("task {:?} fired at {}us", task.token, now.as_micros());
            let mut hook = task.hook;
            {
                let mut cx = Context {
                    state: &mut *state,
                    now,
                    sched: &mut self.sched,
                    router: &mut self.router,
                    source: &mut self.source,
                    halted: &mut self.halted,
                };
                hook(&mut cx);
            }
            if task.rearm {
                self.sched.finish_periodic(task.token, hook, now);
            }
        }
    }

    /// Poll the board; on confirmed edges, walk matching bindings.
    fn poll_pass(&mut self, state: &mut S, now: Instant) {
        if let Some(edges) = self.router.poll(&mut self.source) {
            self.dispatch_pass(state, now, &edges);
        }
    }

    /// Invoke the matched hooks in registration order, stopping after the
    /// first that consumes the event.
    fn dispatch_pass(&mut self, state: &mut S, now: Instant, edges: &Edges) {
        let mut queue = self.router.matched_hooks(edges).into_iter();
        let mut finished = Vec::new();
        for mut taken in queue.by_ref() {
            let result = {
                let mut cx = Context {
                    state: &mut *state,
                    now,
                    sched: &mut self.sched,
                    router: &mut self.router,
                    source: &mut self.source,
                    halted: &mut self.halted,
                };
                (taken.hook)(&mut cx)
            };
            let token = taken.token;
            finished.push(taken);
            if result == Dispatch::Consumed {
                log::trace!("binding {token:?} consumed the event");
                break;
            }
        }
        // Hooks past a consume are never invoked but keep their slots.
        finished.extend(queue);
        self.router.restore_hooks(finished);
    }

    /// Block until `wake`, re-checking residual time after every delay in
    /// case the underlying wait undershoots.
    fn sleep_until(&mut self, wake: Instant) {
        loop {
            let now = self.clock.now();
            let Some(remaining) = wake.checked_duration_since(now) else {
                return;
            };
            if remaining.is_zero() {
                return;
            }
            let us = u64::try_from(remaining.as_micros()).unwrap_or(u64::MAX);
            self.delay.delay_us(us.min(u64::from(u32::MAX)) as u32);
        }
    }
}
