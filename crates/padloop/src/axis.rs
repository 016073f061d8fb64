//! Joystick axis normalization.
//!
//! Raw axis counters arrive in a device-defined range and leave as values
//! in `[-1.0, 1.0]`. Normalization is a pure function of the reading and
//! an [`AxisConfig`] captured when the axis starts being watched; there is
//! no auto-calibration and no hidden state.

/// A joystick axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Normalization parameters for one axis.
///
/// `low` and `high` are the raw counter values treated as the rails. The
/// defaults match a full-swing 16-bit ADC with a 10% deadzone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisConfig {
    /// Raw reading mapped to `-1.0`; anything at or below it pins there.
    pub low: u32,
    /// Raw reading mapped to `1.0`; anything at or above it pins there.
    pub high: u32,
    /// Post-scale magnitude below which the value snaps to `0.0`.
    pub deadzone: f32,
}

impl Default for AxisConfig {
    fn default() -> Self {
        AxisConfig {
            low: 0,
            high: 1 << 16,
            deadzone: 0.1,
        }
    }
}

impl AxisConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw rail values.
    pub fn with_range(mut self, low: u32, high: u32) -> Self {
        self.low = low;
        self.high = high;
        self
    }

    /// Set the deadzone fraction.
    pub fn with_deadzone(mut self, deadzone: f32) -> Self {
        self.deadzone = deadzone;
        self
    }

    /// Map a raw counter reading into `[-1.0, 1.0]`.
    ///
    /// Readings at or outside the rails pin to `±1.0`. In between, the
    /// reading is rescaled linearly over `[low, high]`, then snapped:
    /// magnitudes under the deadzone become `0.0`, and values at or past
    /// `±0.99` become exactly `±1.0` so a stick that cannot quite reach
    /// its electrical rail still reports full deflection.
    pub fn normalize(&self, raw: u32) -> f32 {
        if raw <= self.low {
            return -1.0;
        }
        if raw >= self.high {
            return 1.0;
        }
        // raw is strictly inside (low, high), so the span is non-zero.
        let span = (self.high - self.low) as f32;
        let value = ((raw - self.low) as f32 * 2.0) / span - 1.0;
        // f32::abs is std-only; stay within core.
        if value > -self.deadzone && value < self.deadzone {
            0.0
        } else if value >= 0.99 {
            1.0
        } else if value <= -0.99 {
            -1.0
        } else {
            value
        }
    }
}

/// One watched axis: its configuration and the latest normalized value.
#[derive(Debug, Clone, Copy)]
pub struct AxisState {
    config: AxisConfig,
    value: f32,
}

impl AxisState {
    /// Start watching with `config`, primed as if the counter read zero.
    pub fn new(config: AxisConfig) -> Self {
        AxisState {
            value: config.normalize(0),
            config,
        }
    }

    /// Fold in a fresh raw reading.
    pub fn update(&mut self, raw: u32) {
        self.value = self.config.normalize(raw);
    }

    /// Latest normalized value.
    pub fn value(&self) -> f32 {
        self.value
    }
}
