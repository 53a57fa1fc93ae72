//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 定时器场景

use core::sync::atomic::{AtomicUsize, Ordering};
use std::vec;

use super::{boot, stack, Trace};
use crate::config;
use crate::interrupt;
use crate::process::{Pid, ProcessState};
use crate::sched;
use crate::timer::{self, TimerAction};

/// (参数, 触发时的 tick)
static FIRED: Trace<(usize, u64)> = Trace::new();

static SLEEPER: AtomicUsize = AtomicUsize::new(0);

fn sleeper(_: usize) {
    let t0 = timer::now();
    timer::delay(25);
    FIRED.push((0, timer::now() - t0));
}

fn observer(_: usize) {
    let pid = Pid::from_index(SLEEPER.load(Ordering::SeqCst));
    let sleeping = sched::state(pid) == Some(ProcessState::Sleeping);
    FIRED.push((1, sleeping as u64));
}

#[test]
fn delay_sleeps_for_requested_ticks() {
    let _guard = boot();
    FIRED.clear();
    let pid = sched::spawn("sleeper", sleeper, 0, stack());
    SLEEPER.store(pid.index(), Ordering::SeqCst);
    sched::spawn("observer", observer, 0, stack());

    sched::start();

    assert_eq!(FIRED.take(), vec![(1, 1), (0, 25)]);
}

fn record_fire(arg: usize) {
    FIRED.push((arg, timer::now()));
}

fn arm_out_of_order(_: usize) {
    timer::arm_callback(200, record_fire, 200);
    timer::arm_callback(50, record_fire, 50);
    timer::arm_callback(100, record_fire, 100);
    timer::delay(250);
}

#[test]
fn deadlines_fire_in_order() {
    let _guard = boot();
    FIRED.clear();
    sched::spawn("arm", arm_out_of_order, 0, stack());

    sched::start();

    assert_eq!(FIRED.take(), vec![(50, 50), (100, 100), (200, 200)]);
}

#[test]
fn equal_deadlines_fire_in_arm_order() {
    let _guard = boot();
    FIRED.clear();
    for arg in 1..=3 {
        timer::arm_at(7, TimerAction::Callback { hook: record_fire, arg });
    }
    for _ in 0..7 {
        interrupt::dispatch(config::TIMER_IRQ);
    }
    assert_eq!(FIRED.take(), vec![(1, 7), (2, 7), (3, 7)]);
}

#[test]
fn cancel_prevents_firing() {
    let _guard = boot();
    FIRED.clear();
    let handle = timer::arm_callback(30, record_fire, 30);
    assert_eq!(timer::deadline(handle), Some(30));
    assert!(timer::cancel(handle));
    assert!(!timer::cancel(handle));
    assert_eq!(timer::deadline(handle), None);
    for _ in 0..60 {
        interrupt::dispatch(config::TIMER_IRQ);
    }
    assert!(FIRED.take().is_empty());
    assert_eq!(timer::now(), 60);
}

fn rearm(arg: usize) {
    FIRED.push((arg, timer::now()));
    if arg < 3 {
        timer::arm_callback(10, rearm, arg + 1);
    }
}

#[test]
fn callback_can_rearm_from_tick() {
    let _guard = boot();
    FIRED.clear();
    timer::arm_callback(10, rearm, 1);
    for _ in 0..50 {
        interrupt::dispatch(config::TIMER_IRQ);
    }
    assert_eq!(FIRED.take(), vec![(1, 10), (2, 20), (3, 30)]);
    assert_eq!(timer::pending(), 0);
}

fn ms_sleeper(_: usize) {
    let t0 = timer::now();
    timer::delay_ms(5);
    FIRED.push((0, timer::now() - t0));
    timer::delay(0);
    FIRED.push((1, timer::now() - t0));
}

#[test]
fn delay_ms_uses_tick_rate() {
    let _guard = boot();
    FIRED.clear();
    sched::spawn("ms", ms_sleeper, 0, stack());

    sched::start();

    let expected = timer::ms_to_ticks(5);
    assert_eq!(FIRED.take(), vec![(0, expected), (1, expected)]);
    assert_eq!(timer::ticks_to_ms(timer::ms_to_ticks(1000)), 1000);
}
