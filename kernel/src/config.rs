//! Kestrel 内核配置（自动生成）
//!
//! 此文件由 build.rs 根据 Kernel.toml 自动生成，请勿手动修改

// ============================================================
// 基本信息
// ============================================================

/// 内核名称
pub const KERNEL_NAME: &str = "Kestrel";

/// 内核版本
pub const KERNEL_VERSION: &str = "0.1.0";

// ============================================================
// 调度器配置
// ============================================================

/// 进程表容量
pub const MAX_PROCS: usize = 16;

/// 最小进程栈 (字节)
pub const MIN_STACK_SIZE: usize = 1024;

/// 是否默认开启时间片抢占
pub const PREEMPT_DEFAULT: bool = false;

/// 时间片滴答数
pub const TIME_SLICE_TICKS: u32 = 10;

/// 进程入口返回是否致命
pub const EXIT_IS_FATAL: bool = false;

// ============================================================
// 定时器配置
// ============================================================

/// 系统 tick 频率 (Hz)
pub const TICK_HZ: u64 = 1000;

/// 定时器表容量
pub const MAX_TIMERS: usize = 32;

/// 周期任务表容量
pub const MAX_RTASKS: usize = 16;

// ============================================================
// 中断配置
// ============================================================

/// 中断向量数量
pub const NR_IRQS: usize = 32;

/// 系统 tick 向量
pub const TIMER_IRQ: usize = 0;

/// 延迟重调度软件向量
pub const RESCHED_IRQ: usize = 31;

/// handler 默认优先级
pub const DEFAULT_IRQ_PRIORITY: u8 = 1;

// ============================================================
// 栈监控配置
// ============================================================

/// 栈填充字节
pub const STACK_FILL: u8 = 0xa5;

/// 栈底保护字节数
pub const STACK_GUARD_BYTES: usize = 16;

// ============================================================
// 调试配置
// ============================================================

/// 默认日志级别
pub const LOG_LEVEL: &str = "info";
