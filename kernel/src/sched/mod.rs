//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 调度器模块
//!
//! 单核、同优先级的 FIFO 调度器：
//! - 进程让出、阻塞或终止时切换到就绪队列头部的进程
//! - 可选的时间片抢占（`set_preemption` 或 Kernel.toml 的 scheduler.preempt）
//! - 调度入口: yield_now() -> schedule() -> cpu_switch_to()

pub mod sched;

pub use sched::{
    context_switches,
    current,
    current_pid,
    is_running,
    name,
    preempt_disable,
    preempt_enable,
    preemption,
    process_count,
    set_preemption,
    spawn,
    start,
    state,
    stop,
    try_spawn,
    yield_now,
};

pub(crate) use sched::{
    assert_may_block,
    for_each_process,
    process_entry,
    resched_handler,
    wait_signals,
    KernelState,
    KERNEL,
};
