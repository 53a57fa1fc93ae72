//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! Kestrel：单核嵌入式进程内核
//!
//! 提供：
//! - 协作式（可选时间片抢占）FIFO 调度器与真实的栈切换
//! - 中断分发层：优先级嵌套、pending 锁存、延迟重调度
//! - 按到期时间排序的定时器与周期任务
//! - 进程信号 (wait/post) 与基于信号的消息端口
//! - 栈使用监视
//!
//! 所有存储都是静态分配的，容量由 Kernel.toml 在编译期决定。
//!
//! ```rust,ignore
//! static mut STACK: [u8; 4096] = [0; 4096];
//!
//! fn blink(_: usize) {
//!     loop {
//!         led_toggle();
//!         kestrel::timer::delay_ms(500);
//!     }
//! }
//!
//! kestrel::init();
//! kestrel::spawn("blink", blink, 0, unsafe { &mut *core::ptr::addr_of_mut!(STACK) });
//! kestrel::start();
//! ```

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod list;
pub mod logging;
pub mod monitor;
pub mod msg;
pub mod process;
pub mod rtask;
pub mod sched;
pub mod signal;
pub mod sync;
pub mod timer;

mod init;

#[cfg(test)]
mod tests;

pub use error::KernelError;
pub use init::init;
pub use msg::{Msg, MsgPort};
pub use process::{Pid, ProcessState};
pub use sched::{current, spawn, start, stop, try_spawn, yield_now};
pub use signal::Signals;
pub use timer::Ticks;
