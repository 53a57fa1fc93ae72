//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 内核错误定义
//!
//! 两类错误：
//! - 可恢复错误：`try_*` 系列接口以 `Result<_, KernelError>` 返回给调用者
//! - 致命错误：违反内核不变量或 API 误用，经 [`fatal`] 记录后停止系统
//!
//! 使用方法：
//! ```rust,ignore
//! use kestrel::error::{self, KernelError};
//!
//! // 可恢复
//! let pid = kestrel::try_spawn("worker", worker, 0, stack)?;
//!
//! // 不可恢复
//! error::fatal(KernelError::EmptyWaitMask);
//! ```

use core::fmt;

/// 内核错误
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// 重复初始化
    AlreadyInitialized,

    /// 内核尚未初始化
    NotInitialized,

    /// 进程表已满
    NoProcessSlot,

    /// 进程栈小于配置的最小值
    StackTooSmall,

    /// 定时器表已满
    NoTimerSlot,

    /// 周期任务表已满
    NoRTaskSlot,

    /// 周期为 0
    InvalidPeriod,

    /// 中断向量号越界
    InvalidIrq(usize),

    /// 向量没有注册 handler
    UnhandledIrq(usize),

    /// 进程号不存在
    InvalidPid(usize),

    /// 以空掩码等待信号
    EmptyWaitMask,

    /// 等待掩码包含保留信号位
    ReservedSignal,

    /// 需要进程上下文的调用发生在进程之外
    NotInProcessContext,

    /// 中断处理函数中调用了阻塞接口
    BlockingInInterrupt,

    /// 调度器已在运行
    SchedulerRunning,

    /// 同一把锁被重入
    Deadlock,

    /// 消息端口未初始化
    PortNotInitialized,

    /// 消息端口重复初始化
    PortAlreadyInitialized,

    /// 只有端口的属主进程可以阻塞接收
    NotPortOwner,

    /// 消息没有应答端口
    NoReplyPort,

    /// 事件已有等待者
    EventBusy,

    /// 进程栈溢出
    StackOverflow(usize),

    /// 进程入口函数返回（配置为致命时）
    ProcessExited(usize),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::AlreadyInitialized => write!(f, "already initialized"),
            KernelError::NotInitialized => write!(f, "kernel not initialized"),
            KernelError::NoProcessSlot => write!(f, "process table full"),
            KernelError::StackTooSmall => write!(f, "stack too small"),
            KernelError::NoTimerSlot => write!(f, "timer table full"),
            KernelError::NoRTaskSlot => write!(f, "periodic task table full"),
            KernelError::InvalidPeriod => write!(f, "periodic task period must be non-zero"),
            KernelError::InvalidIrq(irq) => write!(f, "invalid interrupt vector {}", irq),
            KernelError::UnhandledIrq(irq) => write!(f, "unhandled interrupt vector {}", irq),
            KernelError::InvalidPid(pid) => write!(f, "invalid pid {}", pid),
            KernelError::EmptyWaitMask => write!(f, "wait with empty signal mask"),
            KernelError::ReservedSignal => write!(f, "wait mask contains a reserved signal"),
            KernelError::NotInProcessContext => write!(f, "not in process context"),
            KernelError::BlockingInInterrupt => write!(f, "blocking call from interrupt context"),
            KernelError::SchedulerRunning => write!(f, "scheduler already running"),
            KernelError::Deadlock => write!(f, "lock re-entered"),
            KernelError::PortNotInitialized => write!(f, "message port not initialized"),
            KernelError::PortAlreadyInitialized => write!(f, "message port already initialized"),
            KernelError::NotPortOwner => write!(f, "caller does not own the message port"),
            KernelError::NoReplyPort => write!(f, "message has no reply port"),
            KernelError::EventBusy => write!(f, "event already has a waiter"),
            KernelError::StackOverflow(pid) => write!(f, "stack overflow in process {}", pid),
            KernelError::ProcessExited(pid) => write!(f, "process {} exited", pid),
        }
    }
}

/// 致命错误：记录后停止
///
/// 裸机上 panic 进入板级 panic handler；主机测试中表现为普通 panic，
/// 可以用 `#[should_panic]` 捕获。
#[cold]
#[track_caller]
pub fn fatal(err: KernelError) -> ! {
    log::error!("fatal: {}", err);
    panic!("kestrel: {}", err)
}

#[doc(hidden)]
#[cold]
#[track_caller]
pub fn fatal_fmt(args: fmt::Arguments) -> ! {
    log::error!("fatal: {}", args);
    panic!("kestrel: {}", args)
}

/// 内核内部不变量检查，失败即致命
#[macro_export]
macro_rules! kassert {
    ($cond:expr) => {
        if !$cond {
            $crate::error::fatal_fmt(format_args!("assertion failed: {}", stringify!($cond)))
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::error::fatal_fmt(format_args!($($arg)+))
        }
    };
}
