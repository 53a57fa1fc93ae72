//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! RISC-V 64-bit 上下文切换
//!
//! 遵循 Linux 内核的上下文切换实现 (arch/riscv/kernel/entry.S: __switch_to)
//!
//! 保存：
//! - 返回地址 (ra)
//! - 栈指针 (sp)
//! - 被调用者保存寄存器 s0-s11
//! - 启用 D 扩展时还有 fs0-fs11

/// 上下文切换时保存的寄存器
///
/// 布局与 `cpu_switch_to` 中的偏移一一对应
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuContext {
    pub ra: u64,      // 0
    pub sp: u64,      // 8
    pub s: [u64; 12], // 16..112
    pub fs: [u64; 12], // 112..208
}

impl CpuContext {
    pub const fn zeroed() -> Self {
        Self {
            ra: 0,
            sp: 0,
            s: [0; 12],
            fs: [0; 12],
        }
    }

    /// 构造新进程的初始上下文
    ///
    /// 首次切换进来时 `ret` 跳到 `process_trampoline`，s0 携带 pid
    ///
    /// # Safety
    ///
    /// `stack_top` 必须是进程栈的末尾地址
    pub unsafe fn for_process(stack_top: usize, pid: usize) -> Self {
        let mut ctx = Self::zeroed();
        ctx.ra = process_trampoline as usize as u64;
        ctx.sp = (stack_top & !0xF) as u64;
        ctx.s[0] = pid as u64;
        ctx
    }

    pub fn stack_pointer(&self) -> usize {
        self.sp as usize
    }
}

/// 上下文切换函数
///
/// 对应 Linux 内核的 __switch_to
///
/// # 参数
///
/// - `next_ctx`: 下一个进程的上下文指针 (a0)
/// - `prev_ctx`: 当前进程的上下文指针 (a1)
#[cfg(not(target_feature = "d"))]
#[unsafe(naked)]
pub unsafe extern "C" fn cpu_switch_to(next_ctx: *const CpuContext, prev_ctx: *mut CpuContext) {
    core::arch::naked_asm!(
        // 保存当前进程的上下文到 prev
        "sd ra, 0(a1)",
        "sd sp, 8(a1)",
        "sd s0, 16(a1)",
        "sd s1, 24(a1)",
        "sd s2, 32(a1)",
        "sd s3, 40(a1)",
        "sd s4, 48(a1)",
        "sd s5, 56(a1)",
        "sd s6, 64(a1)",
        "sd s7, 72(a1)",
        "sd s8, 80(a1)",
        "sd s9, 88(a1)",
        "sd s10, 96(a1)",
        "sd s11, 104(a1)",
        // 从 next 恢复
        "ld ra, 0(a0)",
        "ld sp, 8(a0)",
        "ld s0, 16(a0)",
        "ld s1, 24(a0)",
        "ld s2, 32(a0)",
        "ld s3, 40(a0)",
        "ld s4, 48(a0)",
        "ld s5, 56(a0)",
        "ld s6, 64(a0)",
        "ld s7, 72(a0)",
        "ld s8, 80(a0)",
        "ld s9, 88(a0)",
        "ld s10, 96(a0)",
        "ld s11, 104(a0)",
        "ret",
    );
}

/// 带浮点寄存器的版本
#[cfg(target_feature = "d")]
#[unsafe(naked)]
pub unsafe extern "C" fn cpu_switch_to(next_ctx: *const CpuContext, prev_ctx: *mut CpuContext) {
    core::arch::naked_asm!(
        "sd ra, 0(a1)",
        "sd sp, 8(a1)",
        "sd s0, 16(a1)",
        "sd s1, 24(a1)",
        "sd s2, 32(a1)",
        "sd s3, 40(a1)",
        "sd s4, 48(a1)",
        "sd s5, 56(a1)",
        "sd s6, 64(a1)",
        "sd s7, 72(a1)",
        "sd s8, 80(a1)",
        "sd s9, 88(a1)",
        "sd s10, 96(a1)",
        "sd s11, 104(a1)",
        "fsd fs0, 112(a1)",
        "fsd fs1, 120(a1)",
        "fsd fs2, 128(a1)",
        "fsd fs3, 136(a1)",
        "fsd fs4, 144(a1)",
        "fsd fs5, 152(a1)",
        "fsd fs6, 160(a1)",
        "fsd fs7, 168(a1)",
        "fsd fs8, 176(a1)",
        "fsd fs9, 184(a1)",
        "fsd fs10, 192(a1)",
        "fsd fs11, 200(a1)",
        "ld ra, 0(a0)",
        "ld sp, 8(a0)",
        "ld s0, 16(a0)",
        "ld s1, 24(a0)",
        "ld s2, 32(a0)",
        "ld s3, 40(a0)",
        "ld s4, 48(a0)",
        "ld s5, 56(a0)",
        "ld s6, 64(a0)",
        "ld s7, 72(a0)",
        "ld s8, 80(a0)",
        "ld s9, 88(a0)",
        "ld s10, 96(a0)",
        "ld s11, 104(a0)",
        "fld fs0, 112(a0)",
        "fld fs1, 120(a0)",
        "fld fs2, 128(a0)",
        "fld fs3, 136(a0)",
        "fld fs4, 144(a0)",
        "fld fs5, 152(a0)",
        "fld fs6, 160(a0)",
        "fld fs7, 168(a0)",
        "fld fs8, 176(a0)",
        "fld fs9, 184(a0)",
        "fld fs10, 192(a0)",
        "fld fs11, 200(a0)",
        "ret",
    );
}

/// 新进程入口跳板：s0 中的 pid 作为第一个参数
#[unsafe(naked)]
unsafe extern "C" fn process_trampoline() -> ! {
    core::arch::naked_asm!(
        "mv a0, s0",
        "call {entry}",
        "unimp",
        entry = sym crate::sched::process_entry,
    );
}

// ============================================================
// 裸机中断屏蔽 (S 模式 sstatus.SIE)
// ============================================================

#[cfg(target_os = "none")]
mod irq {
    use core::arch::asm;

    const SSTATUS_SIE: usize = 1 << 1;

    /// 保存的 sstatus
    pub type IrqFlags = usize;

    /// 板级定时器/外设会唤醒 wfi
    pub const HAS_EXTERNAL_IRQ: bool = true;

    #[inline]
    pub fn local_irq_save() -> IrqFlags {
        let flags: usize;
        unsafe {
            asm!("csrrci {}, sstatus, 2", out(reg) flags, options(nomem, nostack));
        }
        flags
    }

    #[inline]
    pub fn local_irq_restore(flags: IrqFlags) {
        if flags & SSTATUS_SIE != 0 {
            unsafe { asm!("csrsi sstatus, 2", options(nomem, nostack)) };
        }
    }

    #[inline]
    pub fn local_irq_enable() {
        unsafe { asm!("csrsi sstatus, 2", options(nomem, nostack)) };
    }

    /// 在屏蔽中断的状态下调用：sstatus.SIE 为 0 时 pending 的中断仍会唤醒 wfi，
    /// 随后短暂开中断让它被处理
    #[inline]
    pub fn wait_for_interrupt() {
        unsafe { asm!("wfi", "csrsi sstatus, 2", "csrci sstatus, 2") };
    }
}

#[cfg(target_os = "none")]
pub use self::irq::*;
