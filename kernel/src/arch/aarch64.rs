//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! ARMv8 (aarch64) 上下文切换
//!
//! 对应 Linux arch/arm64/kernel/entry.S: cpu_switch_to
//!
//! 保存 x19-x28、fp (x29)、lr (x30)、sp 以及 d8-d15。

/// 上下文切换时保存的寄存器
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuContext {
    pub sp: u64,       // 0
    pub x: [u64; 10],  // 8..88   x19-x28
    pub fp: u64,       // 88
    pub lr: u64,       // 96
    pub d: [u64; 8],   // 104..168 d8-d15
}

impl CpuContext {
    pub const fn zeroed() -> Self {
        Self {
            sp: 0,
            x: [0; 10],
            fp: 0,
            lr: 0,
            d: [0; 8],
        }
    }

    /// 构造新进程的初始上下文：lr 指向跳板，x19 携带 pid
    ///
    /// # Safety
    ///
    /// `stack_top` 必须是进程栈的末尾地址
    pub unsafe fn for_process(stack_top: usize, pid: usize) -> Self {
        let mut ctx = Self::zeroed();
        ctx.sp = (stack_top & !0xF) as u64;
        ctx.lr = process_trampoline as usize as u64;
        ctx.x[0] = pid as u64;
        ctx
    }

    pub fn stack_pointer(&self) -> usize {
        self.sp as usize
    }
}

/// 上下文切换函数
///
/// - `next_ctx`: x0
/// - `prev_ctx`: x1
#[unsafe(naked)]
pub unsafe extern "C" fn cpu_switch_to(next_ctx: *const CpuContext, prev_ctx: *mut CpuContext) {
    core::arch::naked_asm!(
        // 保存到 prev
        "mov x9, sp",
        "str x9, [x1, #0]",
        "stp x19, x20, [x1, #8]",
        "stp x21, x22, [x1, #24]",
        "stp x23, x24, [x1, #40]",
        "stp x25, x26, [x1, #56]",
        "stp x27, x28, [x1, #72]",
        "stp x29, x30, [x1, #88]",
        "stp d8, d9, [x1, #104]",
        "stp d10, d11, [x1, #120]",
        "stp d12, d13, [x1, #136]",
        "stp d14, d15, [x1, #152]",
        // 从 next 恢复
        "ldr x9, [x0, #0]",
        "mov sp, x9",
        "ldp x19, x20, [x0, #8]",
        "ldp x21, x22, [x0, #24]",
        "ldp x23, x24, [x0, #40]",
        "ldp x25, x26, [x0, #56]",
        "ldp x27, x28, [x0, #72]",
        "ldp x29, x30, [x0, #88]",
        "ldp d8, d9, [x0, #104]",
        "ldp d10, d11, [x0, #120]",
        "ldp d12, d13, [x0, #136]",
        "ldp d14, d15, [x0, #152]",
        "ret",
    );
}

/// 新进程入口跳板：x19 中的 pid 作为第一个参数
#[unsafe(naked)]
unsafe extern "C" fn process_trampoline() -> ! {
    core::arch::naked_asm!(
        "mov x0, x19",
        "bl {entry}",
        "brk #0",
        entry = sym crate::sched::process_entry,
    );
}

// ============================================================
// 裸机中断屏蔽 (DAIF.I)
// ============================================================

#[cfg(target_os = "none")]
mod irq {
    use core::arch::asm;

    /// 保存的 DAIF
    pub type IrqFlags = u64;

    pub const HAS_EXTERNAL_IRQ: bool = true;

    #[inline]
    pub fn local_irq_save() -> IrqFlags {
        let daif: u64;
        unsafe {
            asm!("mrs {}, daif", "msr daifset, #2", out(reg) daif, options(nomem, nostack));
        }
        daif
    }

    #[inline]
    pub fn local_irq_restore(flags: IrqFlags) {
        unsafe { asm!("msr daif, {}", in(reg) flags, options(nomem, nostack)) };
    }

    #[inline]
    pub fn local_irq_enable() {
        unsafe { asm!("msr daifclr, #2", options(nomem, nostack)) };
    }

    /// 在屏蔽中断的状态下调用：pending 的中断即使被屏蔽也会唤醒 wfi，
    /// 随后短暂开中断让它被处理
    #[inline]
    pub fn wait_for_interrupt() {
        unsafe { asm!("wfi", "msr daifclr, #2", "isb", "msr daifset, #2") };
    }
}

#[cfg(target_os = "none")]
pub use self::irq::*;
