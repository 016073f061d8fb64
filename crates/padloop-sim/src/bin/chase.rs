//! Catch the running light as it passes the marked cell.
//!
//! A scripted player arms the game with A, then taps B whenever the
//! light approaches the target. Ten rounds, each faster than the last,
//! all on virtual time, so a full game plays out instantly and
//! deterministically. Run with `RUST_LOG=trace` to watch the loop work.

use std::time::Duration;

use padloop::{Action, ButtonId, Context, Dispatch, PadButton, Runtime, Token};
use padloop_sim::{SimClock, SimPad};

const RING: usize = 10;
const ROUNDS: usize = 10;
const TARGET: usize = 7;
const SPEEDS_MS: [u64; ROUNDS] = [110, 100, 100, 90, 80, 80, 70, 60, 50, 40];

const HOP: Token = Token(1);
const PLAYER: Token = Token(2);
const ARM: Token = Token(10);
const CATCH: Token = Token(11);

const A: ButtonId = ButtonId::Pad(PadButton::A);
const B: ButtonId = ButtonId::Pad(PadButton::B);

struct Game {
    ready: bool,
    round: usize,
    pos: usize,
    results: [bool; ROUNDS],
    seed: u32,
}

impl Game {
    fn new() -> Self {
        Game {
            ready: false,
            round: 0,
            pos: 0,
            results: [false; ROUNDS],
            seed: 0x5eed,
        }
    }

    fn scramble_pos(&mut self) {
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.pos = (self.seed >> 16) as usize % RING;
    }
}

fn render(game: &Game) {
    let line: String = (0..RING)
        .map(|i| {
            if i == game.pos {
                'o'
            } else if i == TARGET {
                '^'
            } else {
                '.'
            }
        })
        .collect();
    println!("round {:>2}  [{line}]", game.round + 1);
}

/// One hop of the running light. Re-arms itself at the current round's
/// speed, so catching the light simply re-registers this token with a
/// longer pause.
fn hop(cx: &mut Context<'_, Game>) {
    if !cx.state.ready {
        // Attract mode: blink cell 2 until the player arms the game.
        let blink = (cx.now().as_micros() / 1_000_000) % 2 == 0;
        println!("press A to play {}", if blink { "*" } else { " " });
        cx.after(HOP, Duration::from_millis(100), hop);
        return;
    }
    if cx.state.round >= ROUNDS {
        cx.after(HOP, Duration::ZERO, finish);
        return;
    }

    cx.after(HOP, Duration::from_millis(SPEEDS_MS[cx.state.round]), hop);
    cx.state.pos = (cx.state.pos + 1) % RING;
    render(cx.state);
}

fn finish(cx: &mut Context<'_, Game>) {
    let caught = cx.state.results.iter().filter(|hit| **hit).count();
    let marks: String = cx
        .state
        .results
        .iter()
        .map(|hit| if *hit { '#' } else { '.' })
        .collect();
    println!("game over   [{marks}]  {caught}/{ROUNDS} caught");
    cx.halt();
}

fn main() {
    env_logger::init();

    let clock = SimClock::new();
    let delay = clock.delay();
    let pad = SimPad::new();
    let mut rt: Runtime<Game, _, _, _> = Runtime::new(clock, delay, pad.clone());

    rt.on(ARM, &[A], Action::Pressed, |cx| {
        cx.state.ready = true;
        println!("armed, catch the light at the ^ mark");
        Dispatch::Consumed
    })
    .unwrap();

    rt.on(CATCH, &[B], Action::Pressed, |cx| {
        if !cx.state.ready {
            return Dispatch::Propagate;
        }
        let good = cx.state.pos == TARGET;
        println!(
            "round {:>2}  {}",
            cx.state.round + 1,
            if good { "caught it" } else { "missed" }
        );
        cx.state.results[cx.state.round] = good;
        cx.state.round += 1;
        cx.state.scramble_pos();
        // Pause the chase for half a second before the next round.
        cx.after(HOP, Duration::from_millis(500), hop);
        Dispatch::Consumed
    })
    .unwrap();

    // The scripted player: holds A until the game arms, then taps B as
    // the light comes up on the target.
    let fingers = pad.clone();
    rt.every(PLAYER, Duration::from_millis(30), move |cx| {
        if !cx.state.ready {
            fingers.press(A);
            return;
        }
        fingers.release(A);
        let closing = cx.state.pos == TARGET || (cx.state.pos + 1) % RING == TARGET;
        if closing {
            fingers.press(B);
        } else {
            fingers.release(B);
        }
    });

    let mut game = Game::new();
    game.scramble_pos();
    rt.run_with(&mut game, HOP, hop);
}
