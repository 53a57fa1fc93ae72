//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! x86_64 上下文切换 (System V ABI)
//!
//! 被调用者保存寄存器：rbx, rbp, r12-r15，以及 rsp。
//! 返回地址位于栈顶，由 `ret` 弹出，因此无需单独保存 rip。

/// 上下文切换时保存的寄存器
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuContext {
    pub rsp: u64, // 0x00
    pub rbx: u64, // 0x08
    pub rbp: u64, // 0x10
    pub r12: u64, // 0x18
    pub r13: u64, // 0x20
    pub r14: u64, // 0x28
    pub r15: u64, // 0x30
}

impl CpuContext {
    pub const fn zeroed() -> Self {
        Self {
            rsp: 0,
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
        }
    }

    /// 构造新进程的初始上下文
    ///
    /// 在 16 字节对齐的栈顶下压入 `process_trampoline` 的地址，
    /// 首次切换时 `ret` 弹出它；r12 携带 pid。
    ///
    /// # Safety
    ///
    /// `stack_top` 必须是可写进程栈的末尾地址
    pub unsafe fn for_process(stack_top: usize, pid: usize) -> Self {
        let top = stack_top & !0xF;
        let sp = top - 8;
        (sp as *mut u64).write(process_trampoline as usize as u64);

        let mut ctx = Self::zeroed();
        ctx.rsp = sp as u64;
        ctx.r12 = pid as u64;
        ctx
    }

    pub fn stack_pointer(&self) -> usize {
        self.rsp as usize
    }
}

/// 上下文切换函数
///
/// # 参数
///
/// - `next_ctx`: 下一个进程的上下文指针 (rdi)
/// - `prev_ctx`: 当前进程的上下文指针 (rsi)
#[unsafe(naked)]
pub unsafe extern "C" fn cpu_switch_to(next_ctx: *const CpuContext, prev_ctx: *mut CpuContext) {
    core::arch::naked_asm!(
        // 保存当前进程的上下文到 prev
        "mov qword ptr [rsi + 0x00], rsp",
        "mov qword ptr [rsi + 0x08], rbx",
        "mov qword ptr [rsi + 0x10], rbp",
        "mov qword ptr [rsi + 0x18], r12",
        "mov qword ptr [rsi + 0x20], r13",
        "mov qword ptr [rsi + 0x28], r14",
        "mov qword ptr [rsi + 0x30], r15",
        // 从 next 恢复
        "mov rsp, qword ptr [rdi + 0x00]",
        "mov rbx, qword ptr [rdi + 0x08]",
        "mov rbp, qword ptr [rdi + 0x10]",
        "mov r12, qword ptr [rdi + 0x18]",
        "mov r13, qword ptr [rdi + 0x20]",
        "mov r14, qword ptr [rdi + 0x28]",
        "mov r15, qword ptr [rdi + 0x30]",
        "ret",
    );
}

/// 新进程入口跳板
///
/// 进入时 rsp 16 字节对齐，`call` 之后满足 ABI 要求
#[unsafe(naked)]
unsafe extern "C" fn process_trampoline() -> ! {
    core::arch::naked_asm!(
        "mov rdi, r12",
        "call {entry}",
        "ud2",
        entry = sym crate::sched::process_entry,
    );
}

// ============================================================
// 裸机中断屏蔽 (RFLAGS.IF)
// ============================================================

#[cfg(target_os = "none")]
mod irq {
    use core::arch::asm;

    const RFLAGS_IF: u64 = 1 << 9;

    /// 保存的 RFLAGS
    pub type IrqFlags = u64;

    pub const HAS_EXTERNAL_IRQ: bool = true;

    #[inline]
    pub fn local_irq_save() -> IrqFlags {
        let flags: u64;
        unsafe {
            asm!("pushfq", "pop {}", "cli", out(reg) flags, options(nomem));
        }
        flags
    }

    #[inline]
    pub fn local_irq_restore(flags: IrqFlags) {
        if flags & RFLAGS_IF != 0 {
            unsafe { asm!("sti", options(nomem, nostack)) };
        }
    }

    #[inline]
    pub fn local_irq_enable() {
        unsafe { asm!("sti", options(nomem, nostack)) };
    }

    /// 在屏蔽中断的状态下调用：开中断并休眠，处理完唤醒中断后重新屏蔽
    ///
    /// `sti` 的一条指令延迟保证中断不会落在 `sti` 与 `hlt` 之间
    #[inline]
    pub fn wait_for_interrupt() {
        unsafe { asm!("sti", "hlt", "cli") };
    }
}

#[cfg(target_os = "none")]
pub use self::irq::*;
