//! Board input abstraction.
//!
//! This module provides the [`InputSource`] trait, the seam between the
//! router and whatever actually wires up pins, touch pads, the pad shift
//! register, and the joystick ADCs.
//!
//! ## Claiming
//!
//! The router references buttons lazily: the first binding that names a
//! [`ButtonId`] asks the source to [`claim`](InputSource::claim) it, once,
//! and the source allocates whatever driver state it needs at that point.
//! A refused claim is not an error: the router logs a warning and stops
//! asking about that button, so a program written for a bigger board
//! still runs on a smaller one, minus the missing inputs.
//!
//! ## Example
//!
//! ```rust,ignore
//! struct Board {
//!     pads: GamePadShift,          // shift register, one byte per read
//!     pins: [Option<AnyPin>; 4],   // claimed lazily
//! }
//!
//! impl InputSource for Board {
//!     fn claim(&mut self, button: ButtonId) -> bool {
//!         match button {
//!             ButtonId::Pad(_) => true,
//!             ButtonId::Pin(n) => self.setup_pin(n),
//!             ButtonId::Touch(_) => false, // this board has no touch pads
//!         }
//!     }
//!     // ...
//! }
//! ```

use crate::axis::Axis;
use crate::button::ButtonId;

/// Trait for the hardware side of input polling.
///
/// The router drives this once per poll: discrete reads for each claimed
/// pin or touch button, one packed-word read covering every pad button,
/// and one counter read per watched axis. Implementations are expected to
/// be cheap; the poll runs at tens of hertz on the loop's own schedule.
///
/// Read methods are infallible. A source whose underlying pin read can
/// fail should treat a failed read as "not pressed" rather than surface
/// the error into the dispatch path.
pub trait InputSource {
    /// Allocate whatever backs `button`, returning whether it is usable.
    ///
    /// Called at most once per distinct button, the first time a binding
    /// references it. Returning `false` marks the button unknown: the
    /// router warns and permanently excludes it from polling.
    fn claim(&mut self, button: ButtonId) -> bool;

    /// Current state of a claimed [`ButtonId::Pin`] or [`ButtonId::Touch`]
    /// button, `true` when pressed.
    ///
    /// Never called for [`ButtonId::Pad`] buttons; those arrive packed via
    /// [`pad_bits`](Self::pad_bits).
    fn is_pressed(&mut self, button: ButtonId) -> bool;

    /// Read the packed pad word, one bit per [`PadButton`](crate::PadButton)
    /// according to its fixed mask.
    ///
    /// Called once per poll, and only when at least one pad button has
    /// been claimed.
    fn pad_bits(&mut self) -> u8;

    /// Allocate the driver behind `axis`, returning whether it is usable.
    ///
    /// Same lifecycle as [`claim`](Self::claim): once per axis, refusal is
    /// a warning, not an error.
    fn claim_axis(&mut self, axis: Axis) -> bool;

    /// Raw counter value of a claimed axis, in the device's native range.
    fn read_axis(&mut self, axis: Axis) -> u16;
}
