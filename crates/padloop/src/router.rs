//! Polled input routing.
//!
//! The [`InputRouter`] turns raw board state into edge events and decides
//! which combo bindings they belong to. Per poll it reads every claimed
//! discrete button, decodes one packed pad word, and folds axis counters
//! into their normalized states; the resulting down-set is debounced and
//! diffed against the confirmed state to produce `fresh_down` and
//! `fresh_up` sets.
//!
//! ## Debounce
//!
//! The router trusts a reading only once two consecutive polls agree. A
//! poll that differs from the last recorded raw set updates the record
//! and produces no events, so a contact bounce that flips and reverts
//! within one poll cycle is invisible to bindings.
//!
//! ## Dispatch order
//!
//! Bindings are evaluated in registration order. The router only selects
//! the matching hooks; invocation, short-circuiting on
//! [`Dispatch::Consumed`], happens in the run loop where the hook context
//! lives.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::axis::{Axis, AxisConfig, AxisState};
use crate::button::{Action, ButtonId, PadButton};
use crate::error::BindError;
use crate::interface::InputSource;
use crate::runtime::Context;
use crate::scheduler::Token;

/// What a binding hook tells the dispatcher about the event it was handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The event is handled; later bindings do not see it.
    Consumed,
    /// Keep evaluating later bindings against the same edges.
    Propagate,
}

/// A combo binding hook.
///
/// Runs when its combo's edge arrives and reports whether the event was
/// consumed.
pub type BindHook<S> = Box<dyn FnMut(&mut Context<'_, S>) -> Dispatch + 'static>;

struct Binding<S> {
    /// Re-seat key. Tokens may repeat across bindings; ids never do.
    id: u64,
    token: Token,
    buttons: Vec<ButtonId>,
    action: Action,
    /// Empty only while this binding's hook is out being invoked.
    hook: Option<BindHook<S>>,
}

impl<S> Binding<S> {
    fn matches(&self, edges: &Edges) -> bool {
        let transitions = match self.action {
            Action::Pressed => &edges.fresh_down,
            Action::Released => &edges.fresh_up,
        };
        self.buttons.iter().all(|b| transitions.contains(b))
    }
}

/// The button transitions confirmed by one poll.
pub(crate) struct Edges {
    /// Buttons that went from not-down to down.
    pub(crate) fresh_down: Vec<ButtonId>,
    /// Buttons that went from down to not-down.
    pub(crate) fresh_up: Vec<ButtonId>,
}

/// A hook pulled out of its binding for one dispatch pass.
pub(crate) struct TakenHook<S> {
    id: u64,
    pub(crate) token: Token,
    pub(crate) hook: BindHook<S>,
}

/// Ordered binding table plus the polling state behind it.
pub(crate) struct InputRouter<S> {
    bindings: Vec<Binding<S>>,
    next_id: u64,
    /// Claimed discrete and touch buttons, in claim order.
    discrete: Vec<ButtonId>,
    /// Claimed pad buttons, in claim order.
    pads: Vec<PadButton>,
    /// Buttons the source refused; never polled, never asked again.
    rejected: Vec<ButtonId>,
    /// Axes the source refused, kept so the claim is never repeated.
    rejected_axes: Vec<Axis>,
    /// Raw down-set from the last poll, confirmed or not.
    recorded: Vec<ButtonId>,
    /// Down-set confirmed by two agreeing polls.
    pressed: Vec<ButtonId>,
    axes: Vec<(Axis, AxisState)>,
}

impl<S> InputRouter<S> {
    pub(crate) fn new() -> Self {
        InputRouter {
            bindings: Vec::new(),
            next_id: 0,
            discrete: Vec::new(),
            pads: Vec::new(),
            rejected: Vec::new(),
            rejected_axes: Vec::new(),
            recorded: Vec::new(),
            pressed: Vec::new(),
            axes: Vec::new(),
        }
    }

    /// Append a combo binding, claiming any buttons seen for the first
    /// time.
    pub(crate) fn bind(
        &mut self,
        source: &mut (impl InputSource + ?Sized),
        token: Token,
        buttons: &[ButtonId],
        action: Action,
        hook: BindHook<S>,
    ) -> Result<(), BindError> {
        if buttons.is_empty() {
            return Err(BindError::EmptyCombo);
        }
        for (i, b) in buttons.iter().enumerate() {
            if buttons[..i].contains(b) {
                return Err(BindError::DuplicateButton(*b));
            }
        }
        for &b in buttons {
            self.ensure_claimed(source, b);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.bindings.push(Binding {
            id,
            token,
            buttons: buttons.to_vec(),
            action,
            hook: Some(hook),
        });
        Ok(())
    }

    /// Remove the first binding registered under `token`, if any.
    pub(crate) fn cancel(&mut self, token: Token) {
        if let Some(i) = self.bindings.iter().position(|b| b.token == token) {
            self.bindings.remove(i);
            log::trace!("canceled binding {token:?}");
        }
    }

    /// Start watching an axis, or replace the configuration of one
    /// already watched.
    pub(crate) fn watch_axis(
        &mut self,
        source: &mut (impl InputSource + ?Sized),
        axis: Axis,
        config: AxisConfig,
    ) {
        if let Some(slot) = self.axes.iter_mut().find(|(a, _)| *a == axis) {
            slot.1 = AxisState::new(config);
            return;
        }
        if self.rejected_axes.contains(&axis) {
            return;
        }
        if source.claim_axis(axis) {
            self.axes.push((axis, AxisState::new(config)));
        } else {
            log::warn!("unknown axis {axis:?}");
            self.rejected_axes.push(axis);
        }
    }

    /// Latest normalized value of a watched axis; unwatched axes read as
    /// centered.
    pub(crate) fn axis(&self, axis: Axis) -> f32 {
        self.axes
            .iter()
            .find(|(a, _)| *a == axis)
            .map(|(_, state)| state.value())
            .unwrap_or(0.0)
    }

    /// Whether `button` is in the confirmed down-set.
    pub(crate) fn is_down(&self, button: ButtonId) -> bool {
        self.pressed.contains(&button)
    }

    /// Whether polling has anything to feed: bindings or watched axes.
    pub(crate) fn wants_poll(&self) -> bool {
        !self.bindings.is_empty() || !self.axes.is_empty()
    }

    fn ensure_claimed(&mut self, source: &mut (impl InputSource + ?Sized), button: ButtonId) {
        let known = match button {
            ButtonId::Pad(p) => self.pads.contains(&p),
            _ => self.discrete.contains(&button),
        };
        if known || self.rejected.contains(&button) {
            return;
        }
        if !source.claim(button) {
            log::warn!("unknown button {button:?}");
            self.rejected.push(button);
            return;
        }
        match button {
            ButtonId::Pad(p) => self.pads.push(p),
            _ => self.discrete.push(button),
        }
    }

    /// Read the board once and fold the sample into the debounce state.
    ///
    /// Returns the confirmed transitions, or `None` when the sample was
    /// transient or nothing changed. Axis states update on every poll
    /// regardless.
    pub(crate) fn poll(&mut self, source: &mut impl InputSource) -> Option<Edges> {
        let mut raw = Vec::with_capacity(self.discrete.len() + self.pads.len());
        for &b in &self.discrete {
            if source.is_pressed(b) {
                raw.push(b);
            }
        }
        if !self.pads.is_empty() {
            let word = source.pad_bits();
            for &p in &self.pads {
                if p.is_set(word) {
                    raw.push(ButtonId::Pad(p));
                }
            }
        }
        for (axis, state) in &mut self.axes {
            state.update(u32::from(source.read_axis(*axis)));
        }

        // Both sides are built in claim order, so list equality is set
        // equality here.
        if raw != self.recorded {
            self.recorded = raw;
            return None;
        }

        let fresh_down: Vec<ButtonId> = raw
            .iter()
            .filter(|b| !self.pressed.contains(b))
            .copied()
            .collect();
        let fresh_up: Vec<ButtonId> = self
            .pressed
            .iter()
            .filter(|b| !raw.contains(b))
            .copied()
            .collect();
        if fresh_down.is_empty() && fresh_up.is_empty() {
            return None;
        }
        self.pressed = raw;
        Some(Edges {
            fresh_down,
            fresh_up,
        })
    }

    /// Take the hooks of every binding matching `edges`, in registration
    /// order.
    ///
    /// Each hook leaves its slot empty until
    /// [`restore_hooks`](Self::restore_hooks) re-seats it, so a hook
    /// canceling or registering bindings mid-dispatch cannot disturb the
    /// pass already under way.
    pub(crate) fn matched_hooks(&mut self, edges: &Edges) -> Vec<TakenHook<S>> {
        let mut matched = Vec::new();
        for binding in self.bindings.iter_mut() {
            if binding.matches(edges) {
                if let Some(hook) = binding.hook.take() {
                    matched.push(TakenHook {
                        id: binding.id,
                        token: binding.token,
                        hook,
                    });
                }
            }
        }
        matched
    }

    /// Re-seat hooks taken by [`matched_hooks`](Self::matched_hooks).
    ///
    /// Each hook goes back to the binding it came from, found by id so a
    /// token shared between bindings cannot misroute it. A hook whose
    /// binding was canceled during the pass has nowhere to land and is
    /// dropped.
    pub(crate) fn restore_hooks(&mut self, hooks: Vec<TakenHook<S>>) {
        for taken in hooks {
            if let Some(slot) = self.bindings.iter_mut().find(|b| b.id == taken.id) {
                slot.hook = Some(taken.hook);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::rc::Rc;

    const A: ButtonId = ButtonId::Pad(PadButton::A);
    const B: ButtonId = ButtonId::Pad(PadButton::B);
    const START: ButtonId = ButtonId::Pad(PadButton::Start);

    fn consume() -> BindHook<()> {
        Box::new(|_| Dispatch::Consumed)
    }

    /// Propagating hook whose liveness shows in `marker`'s strong count.
    fn marked(marker: &Rc<()>) -> BindHook<()> {
        let tag = Rc::clone(marker);
        Box::new(move |_| {
            let _ = &tag;
            Dispatch::Propagate
        })
    }

    /// Scriptable board: claims everything except an explicit refuse
    /// list, and reports whatever state the test wrote.
    struct FakeBoard {
        refuse: Vec<ButtonId>,
        refuse_axes: Vec<Axis>,
        claims: Vec<ButtonId>,
        axis_claims: Vec<Axis>,
        pins_down: Vec<ButtonId>,
        word: u8,
        axis_raw: u16,
    }

    impl FakeBoard {
        fn new() -> Self {
            FakeBoard {
                refuse: Vec::new(),
                refuse_axes: Vec::new(),
                claims: Vec::new(),
                axis_claims: Vec::new(),
                pins_down: Vec::new(),
                word: 0,
                axis_raw: 0,
            }
        }
    }

    impl InputSource for FakeBoard {
        fn claim(&mut self, button: ButtonId) -> bool {
            self.claims.push(button);
            !self.refuse.contains(&button)
        }

        fn is_pressed(&mut self, button: ButtonId) -> bool {
            self.pins_down.contains(&button)
        }

        fn pad_bits(&mut self) -> u8 {
            self.word
        }

        fn claim_axis(&mut self, axis: Axis) -> bool {
            self.axis_claims.push(axis);
            !self.refuse_axes.contains(&axis)
        }

        fn read_axis(&mut self, _axis: Axis) -> u16 {
            self.axis_raw
        }
    }

    /// Poll twice with stable input so the reading confirms.
    fn poll_settled(router: &mut InputRouter<()>, board: &mut FakeBoard) -> Option<Edges> {
        let first = router.poll(board);
        match router.poll(board) {
            some @ Some(_) => some,
            None => first,
        }
    }

    #[test]
    fn drivers_are_claimed_once_per_button() {
        let mut router: InputRouter<()> = InputRouter::new();
        let mut board = FakeBoard::new();

        router.bind(&mut board, Token(1), &[A, B], Action::Pressed, consume()).unwrap();
        router.bind(&mut board, Token(2), &[A], Action::Pressed, consume()).unwrap();
        router.bind(&mut board, Token(3), &[A], Action::Released, consume()).unwrap();

        assert_eq!(board.claims, vec![A, B]);
    }

    #[test]
    fn refused_buttons_warn_once_and_never_poll() {
        let mut router: InputRouter<()> = InputRouter::new();
        let mut board = FakeBoard::new();
        let ghost = ButtonId::Pin(9);
        board.refuse.push(ghost);

        // The binding still registers; the ghost button just never
        // contributes.
        router
            .bind(&mut board, Token(1), &[ghost], Action::Pressed, consume())
            .unwrap();
        router
            .bind(&mut board, Token(2), &[ghost, A], Action::Pressed, consume())
            .unwrap();
        assert_eq!(board.claims.iter().filter(|b| **b == ghost).count(), 1);

        board.pins_down.push(ghost);
        board.word = PadButton::A.mask();
        let edges = poll_settled(&mut router, &mut board).unwrap();
        assert_eq!(edges.fresh_down, vec![A]);
    }

    #[test]
    fn combo_validation_rejects_degenerate_sets() {
        let mut router: InputRouter<()> = InputRouter::new();
        let mut board = FakeBoard::new();

        let empty = router.bind(&mut board, Token(1), &[], Action::Pressed, consume());
        assert_eq!(empty.unwrap_err(), BindError::EmptyCombo);

        let dup = router.bind(&mut board, Token(1), &[A, B, A], Action::Pressed, consume());
        assert_eq!(dup.unwrap_err(), BindError::DuplicateButton(A));
        assert!(board.claims.is_empty());
    }

    #[test]
    fn transient_sample_is_recorded_but_not_dispatched() {
        let mut router: InputRouter<()> = InputRouter::new();
        let mut board = FakeBoard::new();
        router.bind(&mut board, Token(1), &[A], Action::Pressed, consume()).unwrap();

        board.word = PadButton::A.mask();
        assert!(router.poll(&mut board).is_none());

        // The glitch reverts before the confirming poll: no edge at all.
        board.word = 0;
        assert!(router.poll(&mut board).is_none());
        assert!(router.poll(&mut board).is_none());
        assert!(!router.is_down(A));
    }

    #[test]
    fn two_agreeing_polls_confirm_an_edge() {
        let mut router: InputRouter<()> = InputRouter::new();
        let mut board = FakeBoard::new();
        router.bind(&mut board, Token(1), &[A], Action::Pressed, consume()).unwrap();

        board.word = PadButton::A.mask();
        assert!(router.poll(&mut board).is_none());
        let edges = router.poll(&mut board).expect("second agreeing poll confirms");
        assert_eq!(edges.fresh_down, vec![A]);
        assert!(edges.fresh_up.is_empty());
        assert!(router.is_down(A));

        // Held steady: no further events.
        assert!(router.poll(&mut board).is_none());

        board.word = 0;
        assert!(router.poll(&mut board).is_none());
        let edges = router.poll(&mut board).expect("release confirms the same way");
        assert_eq!(edges.fresh_up, vec![A]);
        assert!(!router.is_down(A));
    }

    #[test]
    fn combo_requires_simultaneous_arrival() {
        let mut router: InputRouter<()> = InputRouter::new();
        let mut board = FakeBoard::new();
        router.bind(&mut board, Token(1), &[A, B], Action::Pressed, consume()).unwrap();

        // A lands first, B two polls later: the combo edge never forms.
        board.word = PadButton::A.mask();
        let edges = poll_settled(&mut router, &mut board).unwrap();
        assert!(router.matched_hooks(&edges).is_empty());

        board.word = PadButton::A.mask() | PadButton::B.mask();
        let edges = poll_settled(&mut router, &mut board).unwrap();
        assert_eq!(edges.fresh_down, vec![B]);
        assert!(router.matched_hooks(&edges).is_empty());

        // Released and re-pressed together: now it matches.
        board.word = 0;
        poll_settled(&mut router, &mut board).unwrap();
        board.word = PadButton::A.mask() | PadButton::B.mask();
        let edges = poll_settled(&mut router, &mut board).unwrap();
        let matched = router.matched_hooks(&edges);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].token, Token(1));
        router.restore_hooks(matched);
    }

    #[test]
    fn matching_walks_bindings_in_registration_order() {
        let mut router: InputRouter<()> = InputRouter::new();
        let mut board = FakeBoard::new();
        router.bind(&mut board, Token(2), &[A], Action::Pressed, consume()).unwrap();
        router.bind(&mut board, Token(1), &[A], Action::Pressed, consume()).unwrap();
        router.bind(&mut board, Token(3), &[A], Action::Released, consume()).unwrap();

        board.word = PadButton::A.mask();
        let edges = poll_settled(&mut router, &mut board).unwrap();
        let matched = router.matched_hooks(&edges);
        let order: Vec<Token> = matched.iter().map(|taken| taken.token).collect();
        assert_eq!(order, vec![Token(2), Token(1)]);
        router.restore_hooks(matched);

        board.word = 0;
        let edges = poll_settled(&mut router, &mut board).unwrap();
        let matched = router.matched_hooks(&edges);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].token, Token(3));
        router.restore_hooks(matched);
    }

    #[test]
    fn cancel_removes_the_first_matching_binding() {
        let mut router: InputRouter<()> = InputRouter::new();
        let mut board = FakeBoard::new();
        router.bind(&mut board, Token(1), &[A], Action::Pressed, consume()).unwrap();
        router.bind(&mut board, Token(1), &[B], Action::Pressed, consume()).unwrap();

        router.cancel(Token(1));
        assert_eq!(router.bindings.len(), 1);
        assert_eq!(router.bindings[0].buttons, vec![B]);

        router.cancel(Token(1));
        router.cancel(Token(1));
        assert!(router.bindings.is_empty());
        assert!(!router.wants_poll());
    }

    #[test]
    fn mid_pass_cancel_of_a_shared_token_drops_only_that_hook() {
        let mut router: InputRouter<()> = InputRouter::new();
        let mut board = FakeBoard::new();
        let gone = Rc::new(());
        let keep = Rc::new(());
        router.bind(&mut board, Token(7), &[A], Action::Pressed, marked(&gone)).unwrap();
        router.bind(&mut board, Token(7), &[A], Action::Pressed, marked(&keep)).unwrap();

        board.word = PadButton::A.mask();
        let edges = poll_settled(&mut router, &mut board).unwrap();
        let taken = router.matched_hooks(&edges);
        assert_eq!(taken.len(), 2);

        // Cancel lands between take and restore, as it would from inside
        // a hook.
        router.cancel(Token(7));
        router.restore_hooks(taken);

        // The canceled binding's hook is gone; the survivor kept its own.
        assert_eq!(router.bindings.len(), 1);
        assert!(router.bindings[0].hook.is_some());
        assert_eq!(Rc::strong_count(&gone), 1);
        assert_eq!(Rc::strong_count(&keep), 2);
    }

    #[test]
    fn unclaimed_pad_bits_stay_invisible() {
        let mut router: InputRouter<()> = InputRouter::new();
        let mut board = FakeBoard::new();
        router.bind(&mut board, Token(1), &[A], Action::Pressed, consume()).unwrap();

        board.word = PadButton::A.mask() | PadButton::Start.mask();
        let edges = poll_settled(&mut router, &mut board).unwrap();
        assert_eq!(edges.fresh_down, vec![A]);
        assert!(!router.is_down(START));
    }

    #[test]
    fn axes_update_every_poll_and_default_to_center() {
        let mut router: InputRouter<()> = InputRouter::new();
        let mut board = FakeBoard::new();

        assert_eq!(router.axis(Axis::X), 0.0);
        router.watch_axis(&mut board, Axis::X, AxisConfig::default());
        assert!(router.wants_poll());
        assert_eq!(router.axis(Axis::X), -1.0);

        board.axis_raw = 1 << 15;
        router.poll(&mut board);
        assert_eq!(router.axis(Axis::X), 0.0);

        board.axis_raw = u16::MAX;
        router.poll(&mut board);
        assert_eq!(router.axis(Axis::X), 1.0);
        assert_eq!(router.axis(Axis::Y), 0.0);
    }

    #[test]
    fn refused_axes_are_claimed_once_and_stay_quiet() {
        let mut router: InputRouter<()> = InputRouter::new();
        let mut board = FakeBoard::new();
        board.refuse_axes.push(Axis::Y);

        router.watch_axis(&mut board, Axis::Y, AxisConfig::default());
        router.watch_axis(&mut board, Axis::Y, AxisConfig::default());

        assert_eq!(board.axis_claims, vec![Axis::Y]);
        assert_eq!(router.axis(Axis::Y), 0.0);
        assert!(!router.wants_poll());
    }
}
