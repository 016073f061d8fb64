//! Logical button model.
//!
//! A [`ButtonId`] names one physical input source without saying anything
//! about how it is wired. The board's input source decides whether it can
//! actually back a given id; the router only cares about identity and,
//! for the shift-register pad, the fixed bit layout.

/// Buttons carried in the packed shift-register word.
///
/// The bit assignment matches the common handheld pad wiring and is fixed:
/// the board reads one byte, the router decodes it with [`mask`](Self::mask).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadButton {
    A,
    B,
    Start,
    Select,
    X,
    Y,
    Z,
    R,
}

impl PadButton {
    /// Every pad button, in decode order.
    pub const ALL: [PadButton; 8] = [
        PadButton::A,
        PadButton::B,
        PadButton::Start,
        PadButton::Select,
        PadButton::X,
        PadButton::Y,
        PadButton::Z,
        PadButton::R,
    ];

    /// Bit of this button within the packed word.
    pub const fn mask(self) -> u8 {
        match self {
            PadButton::B => 0x01,
            PadButton::A => 0x02,
            PadButton::Start => 0x04,
            PadButton::Select => 0x08,
            PadButton::X => 0x10,
            PadButton::Y => 0x20,
            PadButton::Z => 0x40,
            PadButton::R => 0x80,
        }
    }

    /// Whether this button's bit is set in a packed word.
    pub const fn is_set(self, word: u8) -> bool {
        word & self.mask() != 0
    }
}

/// Identity of one logical button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonId {
    /// A bit in the packed shift-register pad word.
    Pad(PadButton),
    /// A discrete digital input, numbered by the board.
    Pin(u8),
    /// A capacitive touch pad, numbered by the board.
    Touch(u8),
}

/// Which edge a binding fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The whole combo went from not-down to down in one poll.
    Pressed,
    /// The whole combo went from down to not-down in one poll.
    Released,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_bit_layout_is_fixed() {
        assert_eq!(PadButton::B.mask(), 0x01);
        assert_eq!(PadButton::A.mask(), 0x02);
        assert_eq!(PadButton::Start.mask(), 0x04);
        assert_eq!(PadButton::Select.mask(), 0x08);
        assert_eq!(PadButton::X.mask(), 0x10);
        assert_eq!(PadButton::Y.mask(), 0x20);
        assert_eq!(PadButton::Z.mask(), 0x40);
        assert_eq!(PadButton::R.mask(), 0x80);
    }

    #[test]
    fn masks_cover_the_word_without_overlap() {
        let mut seen = 0u8;
        for button in PadButton::ALL {
            assert_eq!(seen & button.mask(), 0);
            seen |= button.mask();
        }
        assert_eq!(seen, 0xFF);
    }

    #[test]
    fn decode_picks_out_set_bits() {
        let word = PadButton::A.mask() | PadButton::Select.mask();
        let down: Vec<PadButton> = PadButton::ALL
            .into_iter()
            .filter(|b| b.is_set(word))
            .collect();
        assert_eq!(down, vec![PadButton::A, PadButton::Select]);
    }
}
