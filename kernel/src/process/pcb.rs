//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 进程控制块

use core::fmt;

use crate::arch::CpuContext;
use crate::list::{Linked, ListLink};
use crate::process::stack::Stack;
use crate::signal::Signals;

/// 进程号（进程表下标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(u16);

impl Pid {
    pub(crate) const fn from_index(index: usize) -> Self {
        Pid(index as u16)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 进程入口函数
pub type ProcessEntry = fn(usize);

/// 进程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// 槽位未分配
    Unused,
    /// 在就绪队列中
    Ready,
    /// 正在 CPU 上运行（同一时刻最多一个）
    Running,
    /// 等待信号
    Waiting,
    /// 在 delay 中睡眠
    Sleeping,
    /// 入口函数已返回，槽位不再复用
    Terminated,
}

impl ProcessState {
    /// 是否处于阻塞状态
    pub fn is_blocked(self) -> bool {
        matches!(self, ProcessState::Waiting | ProcessState::Sleeping)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Unused => "unused",
            ProcessState::Ready => "ready",
            ProcessState::Running => "running",
            ProcessState::Waiting => "waiting",
            ProcessState::Sleeping => "sleeping",
            ProcessState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// 进程控制块
pub struct Pcb {
    pub(crate) ctx: CpuContext,
    pub(crate) state: ProcessState,
    /// 已到达但尚未被消费的信号
    pub(crate) sig_recv: Signals,
    /// 阻塞时等待的信号掩码
    pub(crate) sig_wait: Signals,
    /// 就绪队列链接
    pub(crate) link: ListLink,
    pub(crate) name: &'static str,
    pub(crate) entry: Option<ProcessEntry>,
    pub(crate) arg: usize,
    pub(crate) stack: Stack,
}

impl Pcb {
    pub const EMPTY: Pcb = Pcb {
        ctx: CpuContext::zeroed(),
        state: ProcessState::Unused,
        sig_recv: Signals::empty(),
        sig_wait: Signals::empty(),
        link: ListLink::new(),
        name: "",
        entry: None,
        arg: 0,
        stack: Stack::EMPTY,
    };

    /// 等待中的信号已经到达
    pub(crate) fn wake_condition(&self) -> bool {
        self.sig_recv.intersects(self.sig_wait)
    }
}

impl Linked for Pcb {
    fn link(&self) -> &ListLink {
        &self.link
    }

    fn link_mut(&mut self) -> &mut ListLink {
        &mut self.link
    }
}
