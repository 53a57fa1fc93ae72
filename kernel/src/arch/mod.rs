//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 架构相关代码
//!
//! 每个架构提供：
//! - `CpuContext`：上下文切换时保存的被调用者保存寄存器
//! - `cpu_switch_to(next, prev)`：保存当前寄存器到 prev，从 next 恢复
//! - 进程首次运行时的入口跳板
//!
//! 中断屏蔽分两种实现：
//! - 裸机 (`target_os = "none"`)：直接操作 CPU 中断使能位
//! - 主机 (`hosted`)：用原子变量模拟屏蔽位，空闲时由软件产生 tick，
//!   用于在开发机上运行完整的调度器测试

#[cfg(target_arch = "x86_64")]
mod x86_64;
#[cfg(target_arch = "x86_64")]
use self::x86_64 as cpu;

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "aarch64")]
use self::aarch64 as cpu;

#[cfg(target_arch = "riscv64")]
mod riscv64;
#[cfg(target_arch = "riscv64")]
use self::riscv64 as cpu;

#[cfg(not(target_os = "none"))]
mod hosted;
#[cfg(not(target_os = "none"))]
use self::hosted as irq;

#[cfg(target_os = "none")]
use self::cpu as irq;

pub use self::cpu::CpuContext;
pub use self::irq::{
    local_irq_enable, local_irq_restore, local_irq_save, wait_for_interrupt, IrqFlags,
    HAS_EXTERNAL_IRQ,
};

#[cfg(test)]
pub(crate) use self::hosted::irqs_enabled;

/// 上下文切换
///
/// 保存当前寄存器到 `prev`，然后从 `next` 恢复并跳转。
/// 当其他进程切换回 `prev` 时，本函数才返回。
///
/// # Safety
///
/// - 两个指针必须指向有效的 `CpuContext`，且在切换期间不被其他代码访问
/// - 调用者必须已屏蔽中断
#[inline]
pub unsafe fn context_switch(prev: *mut CpuContext, next: *const CpuContext) {
    // 参数顺序与汇编一致：第一个参数 = next，第二个参数 = prev
    cpu::cpu_switch_to(next, prev);
}
