//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 同步原语 (Synchronization Primitives)
//!
//! - `IrqSpinLock`：关中断自旋锁，内核所有共享状态都由它保护
//! - `Event`：单等待者的自动复位事件

pub mod event;
pub mod irq_lock;

pub use event::Event;
pub use irq_lock::{IrqSpinLock, IrqSpinLockGuard};
