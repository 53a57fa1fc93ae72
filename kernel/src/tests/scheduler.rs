//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 调度器场景

use std::boxed::Box;
use std::vec;
use std::vec::Vec;

use super::{boot, stack, Trace};
use crate::arch;
use crate::config;
use crate::error::KernelError;
use crate::interrupt;
use crate::process::{Pid, ProcessState};
use crate::sched;
use crate::signal::{self, Signals};
use crate::timer;

static TRACE: Trace<char> = Trace::new();

fn letter(arg: usize) -> char {
    (b'A' + arg as u8) as char
}

fn yield_three_times(arg: usize) {
    for _ in 0..3 {
        TRACE.push(letter(arg));
        sched::yield_now();
    }
}

#[test]
fn yield_rotates_in_fifo_order() {
    let _guard = boot();
    TRACE.clear();
    let pids: Vec<Pid> = (0..3)
        .map(|i| sched::spawn("yielder", yield_three_times, i, stack()))
        .collect();

    sched::start();

    assert_eq!(TRACE.take(), vec!['A', 'B', 'C', 'A', 'B', 'C', 'A', 'B', 'C']);
    for pid in pids {
        assert_eq!(sched::state(pid), Some(ProcessState::Terminated));
    }
    assert!(!sched::is_running());
}

fn record_once(arg: usize) {
    TRACE.push(letter(arg));
}

#[test]
fn start_returns_after_every_process_exits() {
    let _guard = boot();
    TRACE.clear();
    let pid = sched::spawn("once", record_once, 0, stack());
    assert_eq!(sched::state(pid), Some(ProcessState::Ready));
    assert_eq!(sched::name(pid), Some("once"));

    sched::start();

    assert_eq!(TRACE.take(), vec!['A']);
    assert_eq!(sched::state(pid), Some(ProcessState::Terminated));
    assert_eq!(sched::current(), None);
}

fn lonely_yield(_: usize) {
    for _ in 0..5 {
        sched::yield_now();
        TRACE.push('y');
    }
}

#[test]
fn yield_without_other_ready_process_returns_at_once() {
    let _guard = boot();
    TRACE.clear();
    sched::spawn("lonely", lonely_yield, 0, stack());

    sched::start();

    assert_eq!(TRACE.take().len(), 5);
    // 只有 start 的那一次切换
    assert_eq!(sched::context_switches(), 1);
}

fn stopper(_: usize) {
    TRACE.push('s');
    sched::stop();
    TRACE.push('!');
}

#[test]
fn stop_returns_control_to_boot_context() {
    let _guard = boot();
    TRACE.clear();
    let first = sched::spawn("stopper", stopper, 0, stack());
    let second = sched::spawn("never", record_once, 1, stack());

    sched::start();

    assert_eq!(TRACE.take(), vec!['s']);
    assert_eq!(sched::state(first), Some(ProcessState::Waiting));
    assert_eq!(sched::state(second), Some(ProcessState::Ready));
    assert!(!sched::is_running());
}

fn parent(_: usize) {
    TRACE.push('p');
    sched::spawn("child", record_once, 2, stack());
    TRACE.push('q');
}

#[test]
fn process_can_spawn_another() {
    let _guard = boot();
    TRACE.clear();
    sched::spawn("parent", parent, 0, stack());

    sched::start();

    assert_eq!(TRACE.take(), vec!['p', 'q', 'C']);
    assert_eq!(sched::process_count(), 2);
}

#[test]
fn spawn_rejects_small_stack() {
    let _guard = boot();
    let tiny = Box::leak(vec![0u8; 16].into_boxed_slice());
    assert_eq!(
        sched::try_spawn("tiny", record_once, 0, tiny),
        Err(KernelError::StackTooSmall)
    );
    assert_eq!(sched::process_count(), 0);
}

#[test]
fn spawn_fails_when_table_is_full() {
    let _guard = boot();
    for _ in 0..config::MAX_PROCS {
        assert!(sched::try_spawn("filler", record_once, 0, stack()).is_ok());
    }
    assert_eq!(
        sched::try_spawn("extra", record_once, 0, stack()),
        Err(KernelError::NoProcessSlot)
    );
}

#[test]
fn spawn_before_init_fails() {
    let _guard = super::kernel_lock();
    crate::init::reset();
    assert_eq!(
        sched::try_spawn("early", record_once, 0, stack()),
        Err(KernelError::NotInitialized)
    );
}

/// 计算密集的进程：每轮模拟一次定时器中断
fn busy(arg: usize) {
    for _ in 0..4 {
        TRACE.push(letter(arg));
        interrupt::dispatch(config::TIMER_IRQ);
    }
}

#[test]
fn time_slice_preempts_busy_processes() {
    let _guard = boot();
    TRACE.clear();
    sched::set_preemption(Some(2));
    assert_eq!(sched::preemption(), Some(2));
    sched::spawn("busy-a", busy, 0, stack());
    sched::spawn("busy-b", busy, 1, stack());

    sched::start();

    assert_eq!(TRACE.take(), vec!['A', 'A', 'B', 'B', 'A', 'A', 'B', 'B']);
}

#[test]
fn cooperative_mode_ignores_ticks() {
    let _guard = boot();
    TRACE.clear();
    assert_eq!(sched::preemption(), None);
    sched::spawn("busy-a", busy, 0, stack());
    sched::spawn("busy-b", busy, 1, stack());

    sched::start();

    assert_eq!(TRACE.take(), vec!['A', 'A', 'A', 'A', 'B', 'B', 'B', 'B']);
}

fn critical(_: usize) {
    sched::preempt_disable();
    for _ in 0..3 {
        TRACE.push('A');
        interrupt::dispatch(config::TIMER_IRQ);
    }
    sched::preempt_enable();
    TRACE.push('Z');
}

#[test]
fn preempt_disable_defers_switch_until_enable() {
    let _guard = boot();
    TRACE.clear();
    sched::set_preemption(Some(1));
    sched::spawn("critical", critical, 0, stack());
    sched::spawn("other", record_once, 1, stack());

    sched::start();

    assert_eq!(TRACE.take(), vec!['A', 'A', 'A', 'B', 'Z']);
}

fn wait_forever(_: usize) {
    signal::wait(Signals::USER0);
    TRACE.push('!');
}

#[test]
fn all_blocked_without_wake_source_returns_to_boot() {
    let _guard = boot();
    TRACE.clear();
    let pid = sched::spawn("stuck", wait_forever, 0, stack());

    sched::start();

    assert!(TRACE.take().is_empty());
    assert_eq!(sched::state(pid), Some(ProcessState::Waiting));
}

#[test]
#[should_panic(expected = "not in process context")]
fn yield_outside_process_is_fatal() {
    let _guard = boot();
    sched::yield_now();
}

/// (进程, 记录时的 tick)
static TICKS: Trace<(char, u64)> = Trace::new();

fn short_sleeper(_: usize) {
    timer::delay(2);
    TICKS.push(('B', timer::now()));
}

fn ticking(_: usize) {
    for _ in 0..6 {
        interrupt::dispatch(config::TIMER_IRQ);
        TICKS.push(('A', timer::now()));
    }
}

#[test]
fn process_woken_on_slice_boundary_runs_at_that_tick() {
    let _guard = boot();
    TICKS.clear();
    sched::set_preemption(Some(2));
    sched::spawn("sleeper", short_sleeper, 0, stack());
    sched::spawn("ticking", ticking, 0, stack());

    sched::start();

    assert_eq!(
        TICKS.take(),
        vec![('A', 1), ('B', 2), ('A', 2), ('A', 3), ('A', 4), ('A', 5), ('A', 6)]
    );
}

const ENABLE_IRQ: usize = 6;

fn enable_preemption_from_handler(_irq: usize) {
    sched::preempt_enable();
}

fn deferred_by_handler(_: usize) {
    sched::preempt_disable();
    TRACE.push('A');
    interrupt::dispatch(config::TIMER_IRQ);
    interrupt::dispatch(ENABLE_IRQ);
    TRACE.push('Z');
}

#[test]
fn preempt_enable_in_handler_switches_after_handler_returns() {
    let _guard = boot();
    TRACE.clear();
    sched::set_preemption(Some(1));
    interrupt::set_handler(ENABLE_IRQ, enable_preemption_from_handler);
    sched::spawn("deferred", deferred_by_handler, 0, stack());
    sched::spawn("other", record_once, 1, stack());

    sched::start();

    assert_eq!(TRACE.take(), vec!['A', 'B', 'Z']);
}

static IRQ_STATE: Trace<bool> = Trace::new();

fn sample_irq_state(_: usize) {
    IRQ_STATE.push(arch::irqs_enabled());
}

fn idle_sleeper(_: usize) {
    timer::arm_callback(3, sample_irq_state, 0);
    timer::delay(5);
    IRQ_STATE.push(arch::irqs_enabled());
}

#[test]
fn idle_waits_with_interrupts_masked_and_restores_them() {
    let _guard = boot();
    IRQ_STATE.clear();
    sched::spawn("idle-sleeper", idle_sleeper, 0, stack());

    sched::start();

    assert_eq!(IRQ_STATE.take(), vec![false, true]);
}
