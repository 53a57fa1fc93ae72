//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 信号
//!
//! 每个进程有一个信号位集合，是进程间、中断到进程的基本通知机制：
//! - `post` 把信号位并入目标进程，若目标正在等待其中任一位则唤醒它
//! - `wait` 阻塞直到掩码中任一位到达，返回并清除到达的位
//! - 掩码之外的位保持 pending，不会被 `wait` 消费
//!
//! 保留位：
//! - `SINGLE`：供 [`Event`](crate::sync::Event) 使用
//! - `TIMEOUT`：`wait_timeout` 超时
//! - `DELAY`：`timer::delay` 内部使用，不能出现在等待掩码中

use bitflags::bitflags;

use crate::error::{self, KernelError};
use crate::process::{Pid, ProcessState};
use crate::sched::{self, KERNEL};
use crate::timer::{self, Ticks};

bitflags! {
    /// 信号位集合
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Signals: u32 {
        const USER0 = 1 << 0;
        const USER1 = 1 << 1;
        const USER2 = 1 << 2;
        const USER3 = 1 << 3;
        const USER4 = 1 << 4;
        const USER5 = 1 << 5;
        const USER6 = 1 << 6;
        const USER7 = 1 << 7;
        const USER8 = 1 << 8;
        const USER9 = 1 << 9;
        const USER10 = 1 << 10;
        const USER11 = 1 << 11;
        const USER12 = 1 << 12;
        const USER13 = 1 << 13;
        const USER14 = 1 << 14;
        const USER15 = 1 << 15;

        /// delay 专用
        const DELAY = 1 << 29;
        /// 单次事件
        const SINGLE = 1 << 30;
        /// 等待超时
        const TIMEOUT = 1 << 31;
    }
}

impl Signals {
    /// 全部用户位
    pub const USER: Signals = Signals::from_bits_retain(0xFFFF);
}

fn check_mask(mask: Signals, reserved: Signals) {
    if mask.is_empty() {
        error::fatal(KernelError::EmptyWaitMask);
    }
    if mask.intersects(reserved) {
        error::fatal(KernelError::ReservedSignal);
    }
}

/// 阻塞直到 `mask` 中任一信号到达
///
/// 返回到达的 `mask` 子集（非空），并从 pending 中清除。
/// 空掩码、中断上下文或进程之外调用均为致命错误。
pub fn wait(mask: Signals) -> Signals {
    check_mask(mask, Signals::DELAY);
    sched::assert_may_block();
    sched::wait_signals(mask, ProcessState::Waiting)
}

/// 带超时的等待
///
/// 在 `ticks` 个 tick 内等待 `mask`；超时返回值只含 `TIMEOUT`。
/// 信号与超时同时到达时两者都会出现在返回值中。
/// `ticks == 0` 时只检查一次，不阻塞。
pub fn wait_timeout(mask: Signals, ticks: Ticks) -> Signals {
    check_mask(mask, Signals::DELAY | Signals::TIMEOUT);
    sched::assert_may_block();

    if ticks == 0 {
        let got = check(mask);
        return if got.is_empty() { Signals::TIMEOUT } else { got };
    }

    let me = sched::current_pid();
    let handle = timer::arm_signal(ticks, me, Signals::TIMEOUT);
    let got = sched::wait_signals(mask | Signals::TIMEOUT, ProcessState::Waiting);
    if !timer::cancel(handle) && !got.contains(Signals::TIMEOUT) {
        // 定时器在信号之后、返回之前到期：丢弃残留的 TIMEOUT
        check(Signals::TIMEOUT);
    }
    got
}

/// 非阻塞检查：返回并清除已到达的 `mask` 子集
pub fn check(mask: Signals) -> Signals {
    let mut k = KERNEL.lock();
    let Some(cur) = k.sched.current() else {
        drop(k);
        error::fatal(KernelError::NotInProcessContext);
    };
    k.sched.take_signals(cur, mask)
}

/// 向进程投递信号，可在任意上下文（包括中断处理函数）中调用
///
/// 不会立即切换：被唤醒的进程进入就绪队列尾部。
pub fn post(pid: Pid, sigs: Signals) {
    let result = KERNEL.lock().sched.post(pid, sigs);
    match result {
        Ok(true) => log::trace!("signal: {:?} woke {}", sigs, pid),
        Ok(false) => {}
        Err(err) => error::fatal(err),
    }
}
