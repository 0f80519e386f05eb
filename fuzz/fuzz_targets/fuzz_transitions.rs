//! Fuzz target for transition accounting.
//!
//! Any transition sequence must produce identical counters whether it runs
//! in global mode or inside a reconciled reservation.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rss_guard::{on_transition, GlobalCounters, PageTransition, Reservation};

#[derive(Debug, Arbitrary)]
struct Input {
    reserve: u32,
    steps: Vec<(u8, u32)>,
}

fn kind(tag: u8) -> PageTransition {
    PageTransition::ALL[usize::from(tag) % PageTransition::ALL.len()]
}

fuzz_target!(|input: Input| {
    let global = GlobalCounters::new();
    for &(tag, size) in &input.steps {
        on_transition(&global, kind(tag), size as usize);
    }

    let local = GlobalCounters::new();
    let reservation = Reservation::begin(&local, input.reserve as usize, Some(0));
    for &(tag, size) in &input.steps {
        on_transition(&local, kind(tag), size as usize);
    }
    reservation.finish();

    assert_eq!(global.snapshot(), local.snapshot());
});
