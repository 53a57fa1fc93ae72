//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 信号与事件场景

use core::sync::atomic::{AtomicUsize, Ordering};
use std::vec;

use super::{boot, stack, Trace};
use crate::interrupt;
use crate::process::{Pid, ProcessState};
use crate::sched;
use crate::signal::{self, Signals};
use crate::sync::Event;
use crate::timer::{self, Ticks};

/// (记录者, 信号位或状态)
static RESULTS: Trace<(usize, u32)> = Trace::new();

static TARGETS: [AtomicUsize; 3] = [AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)];

fn target(i: usize) -> Pid {
    Pid::from_index(TARGETS[i].load(Ordering::SeqCst))
}

fn waiter(arg: usize) {
    let mask = match arg {
        0 => Signals::USER0,
        1 => Signals::USER1,
        _ => Signals::USER0 | Signals::USER2,
    };
    let got = signal::wait(mask);
    RESULTS.push((arg, got.bits()));
    if arg == 1 {
        // USER0 不在掩码中，到达后一直保持 pending
        RESULTS.push((arg, signal::check(Signals::USER0).bits()));
    }
}

fn poster(_: usize) {
    for i in 0..3 {
        signal::post(target(i), Signals::USER0);
    }
    sched::yield_now();
    let blocked = sched::state(target(1)) == Some(ProcessState::Waiting);
    RESULTS.push((9, blocked as u32));
    signal::post(target(1), Signals::USER1);
}

#[test]
fn post_wakes_only_matching_waiters() {
    let _guard = boot();
    RESULTS.clear();
    for i in 0..3 {
        let pid = sched::spawn("waiter", waiter, i, stack());
        TARGETS[i].store(pid.index(), Ordering::SeqCst);
    }
    sched::spawn("poster", poster, 0, stack());

    sched::start();

    let user0 = Signals::USER0.bits();
    assert_eq!(
        RESULTS.take(),
        vec![(0, user0), (2, user0), (9, 1), (1, Signals::USER1.bits()), (1, user0)]
    );
}

fn self_post(_: usize) {
    signal::post(sched::current_pid(), Signals::USER3 | Signals::USER4);
    RESULTS.push((0, signal::wait(Signals::USER3).bits()));
    RESULTS.push((1, signal::check(Signals::USER4).bits()));
    RESULTS.push((2, signal::check(Signals::USER4).bits()));
}

#[test]
fn pending_signal_satisfies_wait_without_blocking() {
    let _guard = boot();
    RESULTS.clear();
    sched::spawn("self", self_post, 0, stack());

    sched::start();

    assert_eq!(
        RESULTS.take(),
        vec![(0, Signals::USER3.bits()), (1, Signals::USER4.bits()), (2, 0)]
    );
    assert_eq!(sched::context_switches(), 1);
}

fn timeout_waiter(_: usize) {
    let t0 = timer::now();
    let got = signal::wait_timeout(Signals::USER0, 50);
    RESULTS.push((got.bits() as usize, (timer::now() - t0) as u32));
    RESULTS.push((0, timer::pending() as u32));
}

#[test]
fn wait_timeout_expires() {
    let _guard = boot();
    RESULTS.clear();
    sched::spawn("timeout", timeout_waiter, 0, stack());

    sched::start();

    assert_eq!(
        RESULTS.take(),
        vec![(Signals::TIMEOUT.bits() as usize, 50), (0, 0)]
    );
}

static WAKE_AT: AtomicUsize = AtomicUsize::new(0);

fn racer(_: usize) {
    let got = signal::wait_timeout(Signals::USER1, 100);
    RESULTS.push((0, got.bits()));
    RESULTS.push((1, timer::now() as u32));
    RESULTS.push((2, timer::pending() as u32));
    // 越过原定的超时点，确认没有残留的 TIMEOUT
    timer::delay(150);
    RESULTS.push((3, signal::check(Signals::TIMEOUT).bits()));
}

fn sender(_: usize) {
    timer::delay(WAKE_AT.load(Ordering::SeqCst) as Ticks);
    signal::post(target(0), Signals::USER1);
}

#[test]
fn signal_before_deadline_cancels_timeout() {
    let _guard = boot();
    RESULTS.clear();
    WAKE_AT.store(10, Ordering::SeqCst);
    let pid = sched::spawn("racer", racer, 0, stack());
    TARGETS[0].store(pid.index(), Ordering::SeqCst);
    sched::spawn("sender", sender, 0, stack());

    sched::start();

    assert_eq!(
        RESULTS.take(),
        vec![(0, Signals::USER1.bits()), (1, 10), (2, 0), (3, 0)]
    );
}

fn poller(_: usize) {
    RESULTS.push((0, signal::wait_timeout(Signals::USER0, 0).bits()));
    signal::post(sched::current_pid(), Signals::USER0);
    RESULTS.push((1, signal::wait_timeout(Signals::USER0, 0).bits()));
}

#[test]
fn zero_timeout_polls() {
    let _guard = boot();
    RESULTS.clear();
    sched::spawn("poller", poller, 0, stack());

    sched::start();

    assert_eq!(
        RESULTS.take(),
        vec![(0, Signals::TIMEOUT.bits()), (1, Signals::USER0.bits())]
    );
    assert_eq!(timer::now(), 0);
}

const DEVICE_IRQ: usize = 5;

fn device_handler(_irq: usize) {
    signal::post(target(0), Signals::USER2);
}

fn raise_device_irq(irq: usize) {
    interrupt::dispatch(irq);
}

fn driver(_: usize) {
    timer::arm_callback(20, raise_device_irq, DEVICE_IRQ);
    let got = signal::wait(Signals::USER2);
    RESULTS.push((got.bits() as usize, timer::now() as u32));
}

#[test]
fn interrupt_handler_wakes_process() {
    let _guard = boot();
    RESULTS.clear();
    interrupt::set_handler(DEVICE_IRQ, device_handler);
    let pid = sched::spawn("driver", driver, 0, stack());
    TARGETS[0].store(pid.index(), Ordering::SeqCst);

    sched::start();

    assert_eq!(RESULTS.take(), vec![(Signals::USER2.bits() as usize, 20)]);
}

fn blocking_handler(_irq: usize) {
    signal::wait(Signals::USER0);
}

#[test]
#[should_panic(expected = "blocking call from interrupt context")]
fn wait_in_interrupt_is_fatal() {
    let _guard = boot();
    interrupt::set_handler(DEVICE_IRQ, blocking_handler);
    interrupt::dispatch(DEVICE_IRQ);
}

#[test]
#[should_panic(expected = "not in process context")]
fn wait_outside_process_is_fatal() {
    let _guard = boot();
    signal::wait(Signals::USER0);
}

#[test]
#[should_panic(expected = "wait mask contains a reserved signal")]
fn wait_on_delay_bit_is_fatal() {
    let _guard = boot();
    signal::wait(Signals::DELAY);
}

#[test]
#[should_panic(expected = "invalid pid")]
fn post_to_unknown_pid_is_fatal() {
    let _guard = boot();
    signal::post(Pid::from_index(3), Signals::USER0);
}

static EVENT: Event = Event::new();

fn event_waiter(_: usize) {
    EVENT.wait();
    RESULTS.push((0, timer::now() as u32));
    // 已触发的事件立即返回
    EVENT.signal();
    EVENT.wait();
    RESULTS.push((1, timer::now() as u32));
    let fired = EVENT.wait_timeout(5);
    RESULTS.push((2, fired as u32));
    RESULTS.push((3, timer::now() as u32));
}

fn fire_event(_: usize) {
    EVENT.signal();
}

#[test]
fn event_wakes_single_waiter() {
    let _guard = boot();
    RESULTS.clear();
    sched::spawn("event", event_waiter, 0, stack());
    timer::arm_callback(30, fire_event, 0);

    sched::start();

    assert_eq!(RESULTS.take(), vec![(0, 30), (1, 30), (2, 0), (3, 35)]);
    assert!(!EVENT.is_set());
}
