//! Error types for registration.
//!
//! Almost everything in this crate degrades instead of failing: canceling
//! an absent token is a no-op and a button the board cannot back is logged
//! and ignored. The one thing rejected outright is a malformed combo,
//! because a binding that can never match is a configuration bug.
//!
//! ## Example
//!
//! ```
//! use padloop::{BindError, ButtonId, PadButton};
//!
//! let err = BindError::DuplicateButton(ButtonId::Pad(PadButton::A));
//! assert_eq!(err.to_string(), "combo repeats button Pad(A)");
//! assert_eq!(BindError::EmptyCombo.to_string(), "combo has no buttons");
//! ```

use crate::button::ButtonId;

/// Errors that can occur when registering a combo binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindError {
    /// The combo names no buttons, so it could never match.
    EmptyCombo,
    /// The combo names the same button twice.
    ///
    /// Carries the first repeated id.
    DuplicateButton(ButtonId),
}

impl core::fmt::Display for BindError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BindError::EmptyCombo => write!(f, "combo has no buttons"),
            BindError::DuplicateButton(button) => {
                write!(f, "combo repeats button {button:?}")
            }
        }
    }
}

impl core::error::Error for BindError {}
