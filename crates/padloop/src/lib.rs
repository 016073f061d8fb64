//! Cooperative event scheduling and combo input dispatch for button-pad
//! devices. Runs anywhere with a microsecond counter and a blocking
//! delay, from MCU firmware to a host simulator.
//!
//! See [`runtime`] for the loop semantics and a worked example.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![cfg_attr(
    not(test),
    deny(
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::unreachable,
        clippy::unwrap_used
    )
)]

extern crate alloc;

pub mod axis;
pub mod button;
pub mod clock;
pub mod error;
pub mod interface;
pub mod router;
pub mod runtime;
pub mod scheduler;

pub use axis::{Axis, AxisConfig, AxisState};
pub use button::{Action, ButtonId, PadButton};
pub use clock::{Clock, Instant};
pub use error::BindError;
pub use interface::InputSource;
pub use router::{BindHook, Dispatch};
pub use runtime::{Context, Runtime, Status, DEFAULT_POLL_INTERVAL};
pub use scheduler::{TaskHook, Token};
