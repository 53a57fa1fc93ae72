//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 周期任务
//!
//! 周期任务是在 tick 中断上下文中运行的回调：
//! - 每个 tick 倒计数减一，减到 0 时调用回调并重新装填周期
//! - 回调返回 `true` 继续，返回 `false` 注销自己
//! - tick 不会补发：每个 tick 只计数一次，错过的周期直接丢弃
//!
//! 回调在锁外调用，可以注册或注销其他周期任务、投递信号、
//! 但不得阻塞。

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::config;
use crate::error::{self, KernelError};
use crate::sync::IrqSpinLock;
use crate::timer::Ticks;

/// 周期任务回调，返回是否继续运行
pub type RTaskFn = fn(usize) -> bool;

/// 周期任务句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RTaskHandle {
    index: u16,
    generation: u32,
}

#[derive(Clone, Copy)]
struct RTask {
    callback: Option<RTaskFn>,
    period: Ticks,
    countdown: Ticks,
    arg: usize,
    generation: u32,
    /// 在本次 tick 的遍历中注册，本 tick 不计数
    fresh: bool,
}

impl RTask {
    const EMPTY: RTask = RTask {
        callback: None,
        period: 0,
        countdown: 0,
        arg: 0,
        generation: 0,
        fresh: false,
    };
}

struct RTaskTable {
    tasks: [RTask; config::MAX_RTASKS],
    in_tick: bool,
}

impl RTaskTable {
    const fn new() -> Self {
        Self {
            tasks: [RTask::EMPTY; config::MAX_RTASKS],
            in_tick: false,
        }
    }

    fn remove(&mut self, index: usize, generation: u32) -> bool {
        let task = &mut self.tasks[index];
        if task.callback.is_none() || task.generation != generation {
            return false;
        }
        task.callback = None;
        task.generation = task.generation.wrapping_add(1);
        ACTIVE.fetch_sub(1, Ordering::Relaxed);
        true
    }
}

static RTASKS: IrqSpinLock<RTaskTable> = IrqSpinLock::new(RTaskTable::new());

/// 已注册的周期任务数（空闲检测无需加锁即可读取）
static ACTIVE: AtomicUsize = AtomicUsize::new(0);

#[cfg(test)]
pub(crate) fn reset() {
    *RTASKS.lock() = RTaskTable::new();
    ACTIVE.store(0, Ordering::Relaxed);
}

/// 注册周期任务，首次在 `period` 个 tick 后运行
pub fn try_register(callback: RTaskFn, period: Ticks, arg: usize) -> Result<RTaskHandle, KernelError> {
    if period == 0 {
        return Err(KernelError::InvalidPeriod);
    }
    let mut table = RTASKS.lock();
    let in_tick = table.in_tick;
    let index = table
        .tasks
        .iter()
        .position(|t| t.callback.is_none())
        .ok_or(KernelError::NoRTaskSlot)?;

    let task = &mut table.tasks[index];
    task.callback = Some(callback);
    task.period = period;
    task.countdown = period;
    task.arg = arg;
    task.fresh = in_tick;
    let handle = RTaskHandle {
        index: index as u16,
        generation: task.generation,
    };
    ACTIVE.fetch_add(1, Ordering::Relaxed);
    drop(table);

    log::debug!("rtask: registered {:?} every {} ticks", handle, period);
    Ok(handle)
}

pub fn register(callback: RTaskFn, period: Ticks, arg: usize) -> RTaskHandle {
    try_register(callback, period, arg).unwrap_or_else(|err| error::fatal(err))
}

/// 注销周期任务；已注销时返回 false
pub fn unregister(handle: RTaskHandle) -> bool {
    RTASKS.lock().remove(handle.index as usize, handle.generation)
}

/// 已注册的周期任务数
pub fn count() -> usize {
    ACTIVE.load(Ordering::Relaxed)
}

/// 由系统 tick 调用
pub(crate) fn tick() {
    RTASKS.lock().in_tick = true;

    for index in 0..config::MAX_RTASKS {
        let due = {
            let mut table = RTASKS.lock();
            let task = &mut table.tasks[index];
            match task.callback {
                Some(_) if task.fresh => None,
                Some(callback) => {
                    task.countdown -= 1;
                    if task.countdown == 0 {
                        task.countdown = task.period;
                        Some((callback, task.arg, task.generation))
                    } else {
                        None
                    }
                }
                None => None,
            }
        };

        if let Some((callback, arg, generation)) = due {
            if !callback(arg) {
                RTASKS.lock().remove(index, generation);
            }
        }
    }

    let mut table = RTASKS.lock();
    table.in_tick = false;
    for task in table.tasks.iter_mut() {
        task.fresh = false;
    }
}
