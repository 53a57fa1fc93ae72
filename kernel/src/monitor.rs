//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 进程监视器
//!
//! 进程栈在 spawn 时被填充为固定字节，通过扫描仍保持填充值的区域
//! 统计每个进程的栈使用高水位。
//!
//! 输出示例：
//! ```text
//! PID  NAME          STATE       STACK     USED   FREE
//! 0    server        waiting      4096      612   3484
//! ```

use crate::process::{Pid, ProcessState, Stack};
use crate::sched;

/// 进程快照
#[derive(Debug, Clone, Copy)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub name: &'static str,
    pub state: ProcessState,
    pub stack_base: usize,
    pub stack_size: usize,
    /// 栈使用高水位
    pub stack_used: usize,
    /// 从未被触及的字节数
    pub stack_free: usize,
}

impl ProcessInfo {
    fn collect(pid: Pid, name: &'static str, state: ProcessState, stack: Stack) -> Self {
        let stack_used = stack.high_water();
        ProcessInfo {
            pid,
            name,
            state,
            stack_base: stack.base(),
            stack_size: stack.size(),
            stack_used,
            stack_free: stack.size() - stack_used,
        }
    }
}

/// 对每个已创建的进程调用 `f`
///
/// 进程表在锁内快照，栈扫描与回调都在锁外进行。
pub fn report<F: FnMut(&ProcessInfo)>(mut f: F) {
    for idx in 0..sched::process_count() {
        if let Some(info) = info(Pid::from_index(idx)) {
            f(&info);
        }
    }
}

/// 单个进程的快照
pub fn info(pid: Pid) -> Option<ProcessInfo> {
    let mut snapshot = None;
    sched::for_each_process(|p, pcb| {
        if p == pid {
            snapshot = Some((pcb.name, pcb.state, pcb.stack));
        }
    });
    let (name, state, stack) = snapshot?;
    Some(ProcessInfo::collect(pid, name, state, stack))
}

/// 通过日志输出进程表
pub fn log_report() {
    log::info!("{:<4} {:<12} {:<10} {:>8} {:>8} {:>8}", "PID", "NAME", "STATE", "STACK", "USED", "FREE");
    report(|p| {
        log::info!(
            "{:<4} {:<12} {:<10} {:>8} {:>8} {:>8}",
            p.pid.index(),
            p.name,
            p.state,
            p.stack_size,
            p.stack_used,
            p.stack_free
        );
    });
}
