//! Host-side collaborators for driving a `padloop` runtime without
//! hardware: a virtual clock whose time passes only while the loop
//! sleeps, a wall clock pair for real-time runs, and a scriptable input
//! source that tests and demo tasks can poke mid-run through cloned
//! handles.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use padloop::{Axis, ButtonId, Clock, InputSource, Instant};

/// Virtual clock for deterministic runs.
///
/// Time stands still while hooks execute and advances only through
/// [`SimDelay`] (the loop sleeping) or an explicit
/// [`advance`](SimClock::advance). Clones share the same counter.
#[derive(Clone, Default)]
pub struct SimClock {
    us: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A delay handle driving this clock.
    pub fn delay(&self) -> SimDelay {
        SimDelay {
            us: Rc::clone(&self.us),
        }
    }

    /// Move time forward by hand.
    pub fn advance(&self, d: Duration) {
        let us = u64::try_from(d.as_micros()).unwrap_or(u64::MAX);
        self.us.set(self.us.get().saturating_add(us));
    }

    /// Microseconds since the epoch the clock started at.
    pub fn elapsed_us(&self) -> u64 {
        self.us.get()
    }
}

impl Clock for SimClock {
    fn now(&mut self) -> Instant {
        Instant::from_micros(self.us.get())
    }
}

/// The sleeping half of a [`SimClock`]: a delay advances the shared
/// counter instead of blocking.
#[derive(Clone)]
pub struct SimDelay {
    us: Rc<Cell<u64>>,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        // Round up so even a 1ns wait moves time, or a loop sleeping in
        // tiny slices would spin forever.
        let us = (u64::from(ns) + 999) / 1_000;
        self.us.set(self.us.get().saturating_add(us));
    }
}

/// Wall clock over [`std::time::Instant`], for demos that should run in
/// real time.
pub struct WallClock {
    epoch: std::time::Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&mut self) -> Instant {
        let us = u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX);
        Instant::from_micros(us)
    }
}

/// Blocking delay over [`std::thread::sleep`].
#[derive(Clone, Copy, Default)]
pub struct WallDelay;

impl DelayNs for WallDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

#[derive(Default)]
struct PadState {
    word: u8,
    pins: Vec<ButtonId>,
    refused_buttons: Vec<ButtonId>,
    refused_axes: Vec<Axis>,
    x: u16,
    y: u16,
}

/// Scriptable input source.
///
/// Clones share state, so a test keeps one handle and hands another to
/// the runtime; scripted tasks can then press and release buttons from
/// inside hooks while the loop polls.
#[derive(Clone, Default)]
pub struct SimPad {
    state: Rc<RefCell<PadState>>,
}

impl SimPad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `claim` refuse this button, as a board without it would.
    pub fn refuse(&self, button: ButtonId) {
        self.state.borrow_mut().refused_buttons.push(button);
    }

    /// Make `claim_axis` refuse this axis.
    pub fn refuse_axis(&self, axis: Axis) {
        self.state.borrow_mut().refused_axes.push(axis);
    }

    /// Hold `button` down until released.
    pub fn press(&self, button: ButtonId) {
        let mut state = self.state.borrow_mut();
        match button {
            ButtonId::Pad(p) => state.word |= p.mask(),
            other => {
                if !state.pins.contains(&other) {
                    state.pins.push(other);
                }
            }
        }
    }

    pub fn release(&self, button: ButtonId) {
        let mut state = self.state.borrow_mut();
        match button {
            ButtonId::Pad(p) => state.word &= !p.mask(),
            other => state.pins.retain(|b| *b != other),
        }
    }

    pub fn release_all(&self) {
        let mut state = self.state.borrow_mut();
        state.word = 0;
        state.pins.clear();
    }

    /// Set the raw counter an axis reads back.
    pub fn set_axis(&self, axis: Axis, raw: u16) {
        let mut state = self.state.borrow_mut();
        match axis {
            Axis::X => state.x = raw,
            Axis::Y => state.y = raw,
        }
    }
}

impl InputSource for SimPad {
    fn claim(&mut self, button: ButtonId) -> bool {
        !self.state.borrow().refused_buttons.contains(&button)
    }

    fn is_pressed(&mut self, button: ButtonId) -> bool {
        self.state.borrow().pins.contains(&button)
    }

    fn pad_bits(&mut self) -> u8 {
        self.state.borrow().word
    }

    fn claim_axis(&mut self, axis: Axis) -> bool {
        !self.state.borrow().refused_axes.contains(&axis)
    }

    fn read_axis(&mut self, axis: Axis) -> u16 {
        let state = self.state.borrow();
        match axis {
            Axis::X => state.x,
            Axis::Y => state.y,
        }
    }
}
