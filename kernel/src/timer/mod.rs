//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 系统 tick 与定时器
//!
//! 定时器按到期 tick 升序挂在一条链表上，插入时线性查找位置，
//! 每次 tick 只需检查链表头部。同一 tick 到期的定时器按插入顺序触发。
//!
//! 到期动作有两种：
//! - 向进程投递信号（在锁内完成）
//! - 调用回调函数（在锁外、中断上下文中调用）
//!
//! tick 处理顺序：时间片计数 -> 到期定时器 -> 周期任务。

use crate::config;
use crate::error::{self, KernelError};
use crate::interrupt;
use crate::list::{Linked, ListHead, ListLink};
use crate::process::{Pid, ProcessState};
use crate::rtask;
use crate::sched::{self, KERNEL};
use crate::signal::Signals;

/// 系统 tick 计数
pub type Ticks = u64;

/// 定时器句柄
///
/// 携带槽位的代数，槽位复用后旧句柄的 cancel 不会误伤新定时器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    index: u16,
    generation: u32,
}

/// 到期动作
#[derive(Debug, Clone, Copy)]
pub enum TimerAction {
    /// 向进程投递信号
    Signal { pid: Pid, sigs: Signals },
    /// 在中断上下文中调用回调
    Callback { hook: fn(usize), arg: usize },
}

struct TimerEntry {
    expires: Ticks,
    action: Option<TimerAction>,
    generation: u32,
    link: ListLink,
}

impl TimerEntry {
    const EMPTY: TimerEntry = TimerEntry {
        expires: 0,
        action: None,
        generation: 0,
        link: ListLink::new(),
    };
}

impl Linked for TimerEntry {
    fn link(&self) -> &ListLink {
        &self.link
    }

    fn link_mut(&mut self) -> &mut ListLink {
        &mut self.link
    }
}

/// 定时器队列
pub(crate) struct TimerQueue {
    entries: [TimerEntry; config::MAX_TIMERS],
    pending: ListHead,
    ticks: Ticks,
}

impl TimerQueue {
    pub(crate) const fn new() -> Self {
        Self {
            entries: [TimerEntry::EMPTY; config::MAX_TIMERS],
            pending: ListHead::new(),
            ticks: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = TimerEntry::EMPTY;
        }
        self.pending.init();
        self.ticks = 0;
    }

    pub(crate) fn now(&self) -> Ticks {
        self.ticks
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// 插入到期时间为 `expires` 的定时器
    pub(crate) fn add(&mut self, expires: Ticks, action: TimerAction) -> Result<TimerHandle, KernelError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.action.is_none())
            .ok_or(KernelError::NoTimerSlot)?;

        let entry = &mut self.entries[index];
        entry.expires = expires;
        entry.action = Some(action);
        let handle = TimerHandle {
            index: index as u16,
            generation: entry.generation,
        };

        // 第一个更晚到期的位置之前；相同到期时间保持先来先到
        let pos = self
            .pending
            .iter(&self.entries)
            .find(|&i| self.entries[i].expires > expires);
        match pos {
            Some(pos) => self.pending.insert_before(&mut self.entries, pos, index),
            None => self.pending.add_tail(&mut self.entries, index),
        }
        Ok(handle)
    }

    fn release(&mut self, index: usize) -> Option<TimerAction> {
        self.pending.del(&mut self.entries, index);
        let entry = &mut self.entries[index];
        entry.generation = entry.generation.wrapping_add(1);
        entry.action.take()
    }

    /// 撤销定时器；已触发或已撤销时返回 false
    pub(crate) fn cancel(&mut self, handle: TimerHandle) -> bool {
        let index = handle.index as usize;
        match self.entries.get(index) {
            Some(e) if e.action.is_some() && e.generation == handle.generation => {
                self.release(index);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn deadline(&self, handle: TimerHandle) -> Option<Ticks> {
        self.entries
            .get(handle.index as usize)
            .filter(|e| e.action.is_some() && e.generation == handle.generation)
            .map(|e| e.expires)
    }

    pub(crate) fn advance(&mut self) -> Ticks {
        self.ticks += 1;
        self.ticks
    }

    /// 取出一个已到期的定时器
    pub(crate) fn pop_expired(&mut self) -> Option<TimerAction> {
        let head = self.pending.first()?;
        if self.entries[head].expires > self.ticks {
            return None;
        }
        self.release(head)
    }
}

// ============================================================
// 公共接口
// ============================================================

/// 当前 tick
pub fn now() -> Ticks {
    KERNEL.lock().timers.now()
}

/// 毫秒换算为 tick（向上取整）
pub const fn ms_to_ticks(ms: u64) -> Ticks {
    (ms * config::TICK_HZ).div_ceil(1000)
}

/// tick 换算为毫秒
pub const fn ticks_to_ms(ticks: Ticks) -> u64 {
    ticks * 1000 / config::TICK_HZ
}

/// 在 `delay` 个 tick 之后触发
pub fn try_arm(delay: Ticks, action: TimerAction) -> Result<TimerHandle, KernelError> {
    let mut k = KERNEL.lock();
    let expires = k.timers.now() + delay;
    try_arm_locked(&mut k, expires, action)
}

/// 在绝对 tick `deadline` 触发
pub fn try_arm_at(deadline: Ticks, action: TimerAction) -> Result<TimerHandle, KernelError> {
    let mut k = KERNEL.lock();
    try_arm_locked(&mut k, deadline, action)
}

fn try_arm_locked(
    k: &mut sched::KernelState,
    expires: Ticks,
    action: TimerAction,
) -> Result<TimerHandle, KernelError> {
    if let TimerAction::Signal { pid, .. } = action {
        k.sched.check_pid(pid)?;
    }
    let handle = k.timers.add(expires, action)?;
    log::debug!("timer: armed {:?} for tick {}", handle, expires);
    Ok(handle)
}

pub fn arm(delay: Ticks, action: TimerAction) -> TimerHandle {
    try_arm(delay, action).unwrap_or_else(|err| error::fatal(err))
}

pub fn arm_at(deadline: Ticks, action: TimerAction) -> TimerHandle {
    try_arm_at(deadline, action).unwrap_or_else(|err| error::fatal(err))
}

/// `delay` 个 tick 后向 `pid` 投递 `sigs`
pub fn arm_signal(delay: Ticks, pid: Pid, sigs: Signals) -> TimerHandle {
    arm(delay, TimerAction::Signal { pid, sigs })
}

/// `delay` 个 tick 后在中断上下文中调用 `hook(arg)`
pub fn arm_callback(delay: Ticks, hook: fn(usize), arg: usize) -> TimerHandle {
    arm(delay, TimerAction::Callback { hook, arg })
}

/// 撤销定时器
///
/// 对已触发或已撤销的句柄无效果，返回 false
pub fn cancel(handle: TimerHandle) -> bool {
    let cancelled = KERNEL.lock().timers.cancel(handle);
    if cancelled {
        log::debug!("timer: cancelled {:?}", handle);
    }
    cancelled
}

/// 定时器的到期 tick；已触发或已撤销时为 None
pub fn deadline(handle: TimerHandle) -> Option<Ticks> {
    KERNEL.lock().timers.deadline(handle)
}

/// 挂起的定时器数量
pub fn pending() -> usize {
    KERNEL.lock().timers.len()
}

/// 当前进程睡眠 `ticks` 个 tick
///
/// `ticks` 为 0 时等同于 yield_now
pub fn delay(ticks: Ticks) {
    sched::assert_may_block();
    if ticks == 0 {
        sched::yield_now();
        return;
    }
    let me = sched::current_pid();
    arm_signal(ticks, me, Signals::DELAY);
    sched::wait_signals(Signals::DELAY, ProcessState::Sleeping);
}

/// 当前进程睡眠 `ms` 毫秒
pub fn delay_ms(ms: u64) {
    delay(ms_to_ticks(ms));
}

/// 系统 tick
pub(crate) fn tick() {
    KERNEL.lock().timers.advance();

    loop {
        let callback = {
            let mut k = KERNEL.lock();
            let k = &mut *k;
            match k.timers.pop_expired() {
                None => break,
                Some(TimerAction::Signal { pid, sigs }) => {
                    log::trace!("timer: post {:?} to {}", sigs, pid);
                    // pid 在 arm 时已校验
                    let _ = k.sched.post(pid, sigs);
                    None
                }
                Some(TimerAction::Callback { hook, arg }) => Some((hook, arg)),
            }
        };
        if let Some((hook, arg)) = callback {
            hook(arg);
        }
    }

    // 到期唤醒的进程已经入队，时间片用完时才能看到它们
    if KERNEL.lock().sched.account_tick() {
        interrupt::request_resched();
    }

    rtask::tick();
}

/// 系统 tick 中断处理函数
pub(crate) fn tick_handler(_irq: usize) {
    tick();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    fn noop(_: usize) {}

    fn callback(arg: usize) -> TimerAction {
        TimerAction::Callback { hook: noop, arg }
    }

    fn fire_all(q: &mut TimerQueue) -> Vec<(Ticks, usize)> {
        let mut fired = Vec::new();
        while !q.is_empty() {
            let now = q.advance();
            while let Some(action) = q.pop_expired() {
                if let TimerAction::Callback { arg, .. } = action {
                    fired.push((now, arg));
                }
            }
        }
        fired
    }

    #[test]
    fn deadlines_fire_in_order() {
        let mut q = TimerQueue::new();
        q.add(200, callback(200)).unwrap();
        q.add(50, callback(50)).unwrap();
        q.add(100, callback(100)).unwrap();
        assert_eq!(fire_all(&mut q), [(50, 50), (100, 100), (200, 200)]);
    }

    #[test]
    fn same_tick_keeps_arm_order() {
        let mut q = TimerQueue::new();
        q.add(10, callback(1)).unwrap();
        q.add(5, callback(0)).unwrap();
        q.add(10, callback(2)).unwrap();
        q.add(10, callback(3)).unwrap();
        let order: Vec<usize> = fire_all(&mut q).into_iter().map(|(_, a)| a).collect();
        assert_eq!(order, [0, 1, 2, 3]);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut q = TimerQueue::new();
        let h = q.add(3, callback(0)).unwrap();
        assert_eq!(q.deadline(h), Some(3));
        assert!(q.cancel(h));
        assert!(!q.cancel(h));
        assert_eq!(q.deadline(h), None);
        assert!(q.is_empty());
    }

    #[test]
    fn stale_handle_does_not_cancel_reused_slot() {
        let mut q = TimerQueue::new();
        let old = q.add(1, callback(0)).unwrap();
        q.advance();
        assert!(q.pop_expired().is_some());
        let new = q.add(5, callback(1)).unwrap();
        assert_ne!(old, new);
        assert!(!q.cancel(old));
        assert_eq!(q.len(), 1);
        assert!(q.cancel(new));
    }

    #[test]
    fn nothing_fires_early() {
        let mut q = TimerQueue::new();
        q.add(2, callback(0)).unwrap();
        q.advance();
        assert!(q.pop_expired().is_none());
        q.advance();
        assert!(q.pop_expired().is_some());
    }

    #[test]
    fn full_table_reports_no_slot() {
        let mut q = TimerQueue::new();
        for i in 0..config::MAX_TIMERS {
            q.add(i as Ticks, callback(i)).unwrap();
        }
        assert_eq!(q.add(0, callback(0)).unwrap_err(), KernelError::NoTimerSlot);
    }

    #[test]
    fn tick_conversion_rounds_up() {
        assert_eq!(ms_to_ticks(0), 0);
        assert_eq!(ms_to_ticks(1000), config::TICK_HZ);
        assert_eq!(ticks_to_ms(config::TICK_HZ * 3), 3000);
        assert!(ms_to_ticks(1) >= 1);
    }
}
