// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn manual_clock_advances() {
    let clock = ManualClock::default();
    let start = clock.now();
    clock.advance_ms(5_000);
    assert_eq!(clock.now() - start, Duration::milliseconds(5_000));
}

#[test]
fn manual_clock_clones_share_time() {
    let clock = ManualClock::default();
    let clone = clock.clone();
    clock.advance_ms(1_000);
    assert_eq!(clock.now(), clone.now());
}

#[test]
fn system_clock_is_monotonic_enough() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}
