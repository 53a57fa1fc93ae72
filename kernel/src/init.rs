//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 内核初始化
//!
//! 板级启动代码的调用顺序：
//! 1. `logging::init(console, level)`（可选）
//! 2. `kestrel::init()`
//! 3. `spawn(...)` 创建进程
//! 4. 配置板级定时器，使其每 tick 调用 `interrupt::dispatch(TIMER_IRQ)`
//! 5. `start()`

use crate::config;
use crate::error::{self, KernelError};
use crate::interrupt;
use crate::sched::{self, KERNEL};
use crate::timer;

/// 初始化调度器、定时器与中断分发层
///
/// 只能调用一次；重复调用为致命错误。
pub fn init() {
    {
        let mut k = KERNEL.lock();
        if k.initialized {
            drop(k);
            error::fatal(KernelError::AlreadyInitialized);
        }
        k.reset();
        k.initialized = true;
    }

    interrupt::init();
    interrupt::set_handler(config::TIMER_IRQ, timer::tick_handler);
    interrupt::set_handler(config::RESCHED_IRQ, sched::resched_handler);

    log::info!(
        "{} {}: {} process slots, {} Hz tick, time slice {:?}",
        config::KERNEL_NAME,
        config::KERNEL_VERSION,
        config::MAX_PROCS,
        config::TICK_HZ,
        sched::preemption()
    );
}

/// 把全部内核状态恢复到上电时的样子，供主机测试在用例之间复位
#[cfg(test)]
pub(crate) fn reset() {
    KERNEL.lock().reset();
    interrupt::reset();
    crate::rtask::reset();
    crate::arch::local_irq_enable();
}
