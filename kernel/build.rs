//! Kestrel 内核构建脚本
//!
//! 这个脚本在编译前运行，负责：
//! 1. 解析 Kernel.toml 配置文件
//! 2. 校验配置项之间的约束
//! 3. 生成 src/config.rs

use std::env;
use std::fs;
use std::path::PathBuf;

/// 读取 `[section] key` 整数项，缺省时使用默认值
fn int(config: &toml::Value, section: &str, key: &str, default: i64) -> i64 {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_integer())
        .unwrap_or(default)
}

fn boolean(config: &toml::Value, section: &str, key: &str, default: bool) -> bool {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_bool())
        .unwrap_or(default)
}

fn string<'a>(config: &'a toml::Value, section: &str, key: &str, default: &'a str) -> &'a str {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or(default)
}

fn main() {
    println!("cargo:rerun-if-changed=../Kernel.toml");
    println!("cargo:rerun-if-changed=build.rs");

    // 缺少 Kernel.toml 时全部使用默认值
    let config: toml::Value = match fs::read_to_string("../Kernel.toml") {
        Ok(content) => toml::from_str(&content).expect("Kernel.toml 解析失败"),
        Err(_) => {
            println!("cargo:warning=Kernel.toml not found, using defaults");
            toml::Value::Table(toml::map::Map::new())
        }
    };

    generate_config_code(&config);
}

fn generate_config_code(config: &toml::Value) {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR 未设置"));

    let kernel_name = string(config, "general", "name", "Kestrel");
    let kernel_version = string(config, "general", "version", "0.1.0");

    let max_procs = int(config, "scheduler", "max_procs", 16);
    let min_stack_size = int(config, "scheduler", "min_stack_size", 1024);
    let preempt = boolean(config, "scheduler", "preempt", false);
    let time_slice_ticks = int(config, "scheduler", "time_slice_ticks", 10);
    let exit_is_fatal = boolean(config, "scheduler", "exit_is_fatal", false);

    let tick_hz = int(config, "timer", "tick_hz", 1000);
    let max_timers = int(config, "timer", "max_timers", 32);
    let max_rtasks = int(config, "timer", "max_rtasks", 16);

    let nr_irqs = int(config, "interrupt", "nr_irqs", 32);
    let timer_irq = int(config, "interrupt", "timer_irq", 0);
    let resched_irq = int(config, "interrupt", "resched_irq", nr_irqs - 1);
    let default_priority = int(config, "interrupt", "default_priority", 1);

    let stack_fill = int(config, "monitor", "stack_fill", 0xA5);
    let guard_bytes = int(config, "monitor", "guard_bytes", 16);

    let log_level = string(config, "debug", "log_level", "info");

    // 配置约束检查：在编译期暴露错误，而不是运行时
    assert!(max_procs > 0 && max_procs <= u16::MAX as i64, "scheduler.max_procs 超出范围");
    assert!(max_timers > 0 && max_timers <= u16::MAX as i64, "timer.max_timers 超出范围");
    assert!(max_rtasks > 0 && max_rtasks <= u16::MAX as i64, "timer.max_rtasks 超出范围");
    assert!(time_slice_ticks > 0, "scheduler.time_slice_ticks 必须大于 0");
    assert!(tick_hz > 0, "timer.tick_hz 必须大于 0");
    assert!(nr_irqs >= 2, "interrupt.nr_irqs 至少为 2");
    assert!((0..nr_irqs).contains(&timer_irq), "interrupt.timer_irq 超出范围");
    assert!((0..nr_irqs).contains(&resched_irq), "interrupt.resched_irq 超出范围");
    assert!(timer_irq != resched_irq, "timer_irq 与 resched_irq 不能相同");
    assert!((1..=255).contains(&default_priority), "interrupt.default_priority 必须在 1..=255");
    assert!((0..=255).contains(&stack_fill), "monitor.stack_fill 必须是单字节");
    assert!(guard_bytes >= 0 && guard_bytes < min_stack_size, "monitor.guard_bytes 必须小于最小栈");
    assert!(
        matches!(log_level, "off" | "error" | "warn" | "info" | "debug" | "trace"),
        "debug.log_level 无效: {}",
        log_level
    );

    let config_header = format!(
        r#"//! Kestrel 内核配置（自动生成）
//!
//! 此文件由 build.rs 根据 Kernel.toml 自动生成，请勿手动修改

// ============================================================
// 基本信息
// ============================================================

/// 内核名称
pub const KERNEL_NAME: &str = "{}";

/// 内核版本
pub const KERNEL_VERSION: &str = "{}";

// ============================================================
// 调度器配置
// ============================================================

/// 进程表容量
pub const MAX_PROCS: usize = {};

/// 最小进程栈 (字节)
pub const MIN_STACK_SIZE: usize = {};

/// 是否默认开启时间片抢占
pub const PREEMPT_DEFAULT: bool = {};

/// 时间片滴答数
pub const TIME_SLICE_TICKS: u32 = {};

/// 进程入口返回是否致命
pub const EXIT_IS_FATAL: bool = {};

// ============================================================
// 定时器配置
// ============================================================

/// 系统 tick 频率 (Hz)
pub const TICK_HZ: u64 = {};

/// 定时器表容量
pub const MAX_TIMERS: usize = {};

/// 周期任务表容量
pub const MAX_RTASKS: usize = {};

// ============================================================
// 中断配置
// ============================================================

/// 中断向量数量
pub const NR_IRQS: usize = {};

/// 系统 tick 向量
pub const TIMER_IRQ: usize = {};

/// 延迟重调度软件向量
pub const RESCHED_IRQ: usize = {};

/// handler 默认优先级
pub const DEFAULT_IRQ_PRIORITY: u8 = {};

// ============================================================
// 栈监控配置
// ============================================================

/// 栈填充字节
pub const STACK_FILL: u8 = {:#04x};

/// 栈底保护字节数
pub const STACK_GUARD_BYTES: usize = {};

// ============================================================
// 调试配置
// ============================================================

/// 默认日志级别
pub const LOG_LEVEL: &str = "{}";
"#,
        kernel_name,
        kernel_version,
        max_procs,
        min_stack_size,
        preempt,
        time_slice_ticks,
        exit_is_fatal,
        tick_hz,
        max_timers,
        max_rtasks,
        nr_irqs,
        timer_irq,
        resched_irq,
        default_priority,
        stack_fill,
        guard_bytes,
        log_level,
    );

    let config_file = manifest_dir.join("src").join("config.rs");

    // 只有内容变化时才写入，避免每次编译都更新文件时间戳
    let existing_content = fs::read_to_string(&config_file).unwrap_or_default();
    if existing_content != config_header {
        fs::write(&config_file, &config_header).expect("写入配置文件失败");
    }
}
