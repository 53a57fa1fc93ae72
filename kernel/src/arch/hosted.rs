//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 主机环境下的中断模拟
//!
//! 在开发机上运行时没有真实的中断控制器：
//! - 中断屏蔽位用一个原子变量表示
//! - 空闲等待直接投递一次系统 tick，时间只在所有进程都阻塞时前进
//!
//! 进程仍然在各自的栈上通过真实的 `cpu_switch_to` 切换。

use core::sync::atomic::{AtomicBool, Ordering};

use crate::config;
use crate::interrupt;

static IRQ_ENABLED: AtomicBool = AtomicBool::new(true);

/// 屏蔽前的使能状态
pub type IrqFlags = bool;

/// 主机上没有外部中断源，空闲等待只能靠模拟 tick 推进
pub const HAS_EXTERNAL_IRQ: bool = false;

#[inline]
pub fn local_irq_save() -> IrqFlags {
    IRQ_ENABLED.swap(false, Ordering::SeqCst)
}

#[inline]
pub fn local_irq_restore(flags: IrqFlags) {
    IRQ_ENABLED.store(flags, Ordering::SeqCst);
}

#[inline]
pub fn local_irq_enable() {
    IRQ_ENABLED.store(true, Ordering::SeqCst);
}

#[cfg(test)]
pub fn irqs_enabled() -> bool {
    IRQ_ENABLED.load(Ordering::SeqCst)
}

/// 空闲等待：模拟下一次定时器中断
pub fn wait_for_interrupt() {
    interrupt::dispatch(config::TIMER_IRQ);
}
