//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 进程
//!
//! 进程是运行在自己栈上的协作式执行流：
//! - 进程表是固定容量的静态数组，下标即 [`Pid`]
//! - 栈由调用者提供，内核不做动态分配
//! - 入口函数返回即进程终止

pub mod pcb;
pub mod stack;

pub use pcb::{Pcb, Pid, ProcessEntry, ProcessState};
pub use stack::Stack;
