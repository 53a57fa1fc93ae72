//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 单次事件
//!
//! 一个进程等待、任意上下文触发的自动复位事件，建立在 `SINGLE` 信号位上。
//! 先触发后等待时，等待立即返回。

use crate::error::{self, KernelError};
use crate::process::Pid;
use crate::sched;
use crate::signal::{self, Signals};
use crate::sync::IrqSpinLock;
use crate::timer::Ticks;

struct EventState {
    set: bool,
    waiter: Option<Pid>,
}

/// 自动复位事件
pub struct Event {
    state: IrqSpinLock<EventState>,
}

impl Event {
    pub const fn new() -> Self {
        Self {
            state: IrqSpinLock::new(EventState {
                set: false,
                waiter: None,
            }),
        }
    }

    /// 事件是否已触发且尚未被消费
    pub fn is_set(&self) -> bool {
        self.state.lock().set
    }

    /// 消费已触发的事件，否则登记为等待者
    fn consume_or_register(&self, me: Pid) -> bool {
        let mut state = self.state.lock();
        if state.set {
            state.set = false;
            state.waiter = None;
            return true;
        }
        match state.waiter {
            Some(other) if other != me => {
                drop(state);
                error::fatal(KernelError::EventBusy)
            }
            _ => state.waiter = Some(me),
        }
        false
    }

    /// 等待事件触发
    pub fn wait(&self) {
        let me = sched::current_pid();
        while !self.consume_or_register(me) {
            signal::wait(Signals::SINGLE);
        }
    }

    /// 限时等待，返回事件是否触发
    pub fn wait_timeout(&self, ticks: Ticks) -> bool {
        let me = sched::current_pid();
        let deadline = crate::timer::now() + ticks;
        loop {
            if self.consume_or_register(me) {
                return true;
            }
            let now = crate::timer::now();
            if now >= deadline {
                self.state.lock().waiter = None;
                return false;
            }
            signal::wait_timeout(Signals::SINGLE, deadline - now);
        }
    }

    /// 触发事件，唤醒等待者（可在中断上下文中调用）
    pub fn signal(&self) {
        let waiter = {
            let mut state = self.state.lock();
            state.set = true;
            state.waiter.take()
        };
        if let Some(pid) = waiter {
            signal::post(pid, Signals::SINGLE);
        }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}
