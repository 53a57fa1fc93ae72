//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 内核日志
//!
//! `log` 门面的控制台后端。板级代码提供一个 [`Console`]（通常是 UART），
//! 日志格式为 `[LEVEL target] message`，换行转换为 `\r\n`。
//!
//! 日志可能在持有内核锁时输出，后端不得调用任何内核接口。

use core::fmt::{self, Write};

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::config;
use crate::error::KernelError;

/// 字节输出设备
pub trait Console: Sync {
    fn putchar(&self, c: u8);

    /// 输出一整行，实现者可以保证行内不被打断
    fn write_bytes(&self, bytes: &[u8]) {
        for &b in bytes {
            self.putchar(b);
        }
    }
}

const LINE_MAX: usize = 256;

/// 行缓冲：一条日志先格式化到栈上，再一次性交给控制台
///
/// 超长部分截断，换行转换为 `\r\n`
struct LineBuffer {
    buf: [u8; LINE_MAX],
    len: usize,
}

impl LineBuffer {
    const fn new() -> Self {
        Self {
            buf: [0; LINE_MAX],
            len: 0,
        }
    }

    fn push(&mut self, b: u8) {
        if self.len < LINE_MAX {
            self.buf[self.len] = b;
            self.len += 1;
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl fmt::Write for LineBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                self.push(b'\r');
            }
            self.push(b);
        }
        Ok(())
    }
}

struct KernelLogger {
    console: &'static dyn Console,
}

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut line = LineBuffer::new();
        let _ = write!(line, "[{:<5} {}] {}", record.level(), record.target(), record.args());
        // 截断时也保证以换行结束
        line.len = line.len.min(LINE_MAX - 2);
        let _ = line.write_str("\n");
        self.console.write_bytes(line.as_bytes());
    }

    fn flush(&self) {}
}

static LOGGER: spin::Once<KernelLogger> = spin::Once::new();

/// 配置的默认日志级别（启用 `debug_log` 特性时为 trace）
pub fn default_level() -> LevelFilter {
    if cfg!(feature = "debug_log") {
        return LevelFilter::Trace;
    }
    parse_level(config::LOG_LEVEL).unwrap_or(LevelFilter::Info)
}

/// 解析日志级别名
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// 安装控制台日志后端
///
/// 只能调用一次；再次调用返回 `AlreadyInitialized`。
pub fn init(console: &'static dyn Console, level: LevelFilter) -> Result<(), KernelError> {
    if LOGGER.is_completed() {
        return Err(KernelError::AlreadyInitialized);
    }
    let logger = LOGGER.call_once(|| KernelLogger { console });
    log::set_logger(logger).map_err(|_| KernelError::AlreadyInitialized)?;
    log::set_max_level(level);
    log::log!(Level::Info, "{} {} logging at {}", config::KERNEL_NAME, config::KERNEL_VERSION, level);
    Ok(())
}

/// 调整日志级别
pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}
