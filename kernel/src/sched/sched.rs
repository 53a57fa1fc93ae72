//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 调度器核心
//!
//! 单核、同优先级、FIFO 就绪队列：
//! - 进程主动让出 (yield)、阻塞 (wait/delay) 或终止时发生切换
//! - 开启抢占时，时间片在 tick 中计数，用完后由最低优先级的
//!   重调度软件中断完成切换（不在任何中断处理函数的栈帧内）
//! - 就绪队列为空时在当前栈上空闲等待中断
//!
//! 调度入口: yield_now()/wait_signals()/exit -> schedule() -> cpu_switch_to()

use crate::arch::{self, CpuContext};
use crate::config;
use crate::error::{self, KernelError};
use crate::interrupt;
use crate::kassert;
use crate::list::ListHead;
use crate::process::{Pcb, Pid, ProcessEntry, ProcessState, Stack};
use crate::rtask;
use crate::signal::Signals;
use crate::sync::{IrqSpinLock, IrqSpinLockGuard};
use crate::timer::TimerQueue;

/// 受同一把关中断锁保护的内核状态
///
/// 定时器队列与调度器放在一起：tick 中到期的信号投递需要同时修改两者
pub(crate) struct KernelState {
    pub(crate) sched: Scheduler,
    pub(crate) timers: TimerQueue,
    pub(crate) initialized: bool,
}

impl KernelState {
    const fn new() -> Self {
        Self {
            sched: Scheduler::new(),
            timers: TimerQueue::new(),
            initialized: false,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.sched.reset();
        self.timers.reset();
        self.initialized = false;
    }
}

pub(crate) static KERNEL: IrqSpinLock<KernelState> = IrqSpinLock::new(KernelState::new());

type KernelGuard = IrqSpinLockGuard<'static, KernelState>;

/// 运行队列与进程表
pub(crate) struct Scheduler {
    pub(crate) procs: [Pcb; config::MAX_PROCS],
    /// 已分配槽位数（槽位不复用）
    nr_procs: usize,
    /// 未终止的进程数
    live: usize,
    ready: ListHead,
    current: Option<usize>,
    /// start() 调用者的上下文
    boot_ctx: CpuContext,
    running: bool,
    stop_requested: bool,
    /// 抢占时间片，None 表示协作式
    time_slice: Option<u32>,
    slice_left: u32,
    /// preempt_disable 嵌套计数
    preempt_count: u32,
    /// 禁止抢占期间到期的重调度请求
    resched_pending: bool,
    switches: u64,
}

impl Scheduler {
    const fn new() -> Self {
        Self {
            procs: [Pcb::EMPTY; config::MAX_PROCS],
            nr_procs: 0,
            live: 0,
            ready: ListHead::new(),
            current: None,
            boot_ctx: CpuContext::zeroed(),
            running: false,
            stop_requested: false,
            time_slice: None,
            slice_left: 0,
            preempt_count: 0,
            resched_pending: false,
            switches: 0,
        }
    }

    fn reset(&mut self) {
        for pcb in self.procs.iter_mut() {
            *pcb = Pcb::EMPTY;
        }
        self.nr_procs = 0;
        self.live = 0;
        self.ready.init();
        self.current = None;
        self.boot_ctx = CpuContext::zeroed();
        self.running = false;
        self.stop_requested = false;
        self.time_slice = if config::PREEMPT_DEFAULT || cfg!(feature = "preempt") {
            Some(config::TIME_SLICE_TICKS)
        } else {
            None
        };
        self.slice_left = 0;
        self.preempt_count = 0;
        self.resched_pending = false;
        self.switches = 0;
    }

    fn spawn(
        &mut self,
        name: &'static str,
        entry: ProcessEntry,
        arg: usize,
        stack: Stack,
    ) -> Result<Pid, KernelError> {
        if self.nr_procs >= config::MAX_PROCS {
            return Err(KernelError::NoProcessSlot);
        }
        let idx = self.nr_procs;
        self.nr_procs += 1;

        // SAFETY: 栈已填充且归该进程独占
        let ctx = unsafe { CpuContext::for_process(stack.top(), idx) };
        self.procs[idx] = Pcb {
            ctx,
            name,
            entry: Some(entry),
            arg,
            stack,
            ..Pcb::EMPTY
        };
        self.live += 1;
        self.make_ready(idx);
        Ok(Pid::from_index(idx))
    }

    fn make_ready(&mut self, idx: usize) {
        self.procs[idx].state = ProcessState::Ready;
        self.ready.add_tail(&mut self.procs, idx);
    }

    fn pick_next(&mut self) -> Option<usize> {
        self.ready.pop_front(&mut self.procs)
    }

    fn reset_slice(&mut self) {
        if let Some(quantum) = self.time_slice {
            self.slice_left = quantum;
        }
    }

    pub(crate) fn check_pid(&self, pid: Pid) -> Result<usize, KernelError> {
        if pid.index() < self.nr_procs {
            Ok(pid.index())
        } else {
            Err(KernelError::InvalidPid(pid.index()))
        }
    }

    pub(crate) fn current(&self) -> Option<usize> {
        self.current
    }

    /// 投递信号；目标因此满足等待条件时移入就绪队列
    ///
    /// 返回目标是否被唤醒
    pub(crate) fn post(&mut self, pid: Pid, sigs: Signals) -> Result<bool, KernelError> {
        let idx = self.check_pid(pid)?;
        let pcb = &mut self.procs[idx];
        pcb.sig_recv |= sigs;
        if pcb.state.is_blocked() && pcb.wake_condition() {
            pcb.sig_wait = Signals::empty();
            self.make_ready(idx);
            return Ok(true);
        }
        Ok(false)
    }

    /// 取走当前进程已到达的 `mask` 中的信号
    pub(crate) fn take_signals(&mut self, idx: usize, mask: Signals) -> Signals {
        let pcb = &mut self.procs[idx];
        let got = pcb.sig_recv & mask;
        pcb.sig_recv.remove(got);
        got
    }

    /// 时间片计数，返回是否需要重调度
    pub(crate) fn account_tick(&mut self) -> bool {
        let Some(quantum) = self.time_slice else {
            return false;
        };
        let Some(cur) = self.current else {
            return false;
        };
        if self.procs[cur].state != ProcessState::Running {
            return false;
        }
        self.slice_left = self.slice_left.saturating_sub(1);
        if self.slice_left > 0 {
            return false;
        }
        self.slice_left = quantum;
        !self.ready.is_empty()
    }

    pub(crate) fn has_live_processes(&self) -> bool {
        self.live > 0
    }
}

// ============================================================
// 上下文切换
// ============================================================

/// 切换离开当前进程
///
/// 调用者已把当前进程置为新状态（就绪并入队、阻塞或终止）。
/// 就绪队列为空时在当前栈上空闲等待；被切回时本函数返回，
/// 中断状态恢复为调用者加锁前的状态。
fn schedule(mut k: KernelGuard) {
    let prev = match k.sched.current {
        Some(prev) => prev,
        None => error::fatal(KernelError::NotInProcessContext),
    };

    let next = loop {
        if k.sched.stop_requested {
            break None;
        }
        if let Some(next) = k.sched.pick_next() {
            break Some(next);
        }
        if !k.sched.has_live_processes() {
            break None;
        }
        if !arch::HAS_EXTERNAL_IRQ && k.timers.is_empty() && rtask::count() == 0 {
            log::warn!("sched: every process is blocked and nothing can wake them");
            break None;
        }
        // 保持屏蔽直到休眠指令，避免唤醒中断落在检查与休眠之间
        let flags = k.unlock_keep_irqs_masked();
        arch::wait_for_interrupt();
        arch::local_irq_restore(flags);
        k = KERNEL.lock();
    };

    let sched = &mut k.sched;
    check_stack(&sched.procs[prev], prev);

    let next_ctx: *const CpuContext = match next {
        // 空闲期间自己被唤醒
        Some(next) if next == prev => {
            sched.procs[next].state = ProcessState::Running;
            sched.reset_slice();
            return;
        }
        Some(next) => {
            kassert!(
                sched.procs[next].stack.contains(sched.procs[next].ctx.stack_pointer()),
                "sched: saved stack pointer of {} outside its stack",
                next
            );
            sched.procs[next].state = ProcessState::Running;
            sched.current = Some(next);
            sched.reset_slice();
            sched.switches += 1;
            log::trace!("sched: switch {} -> {}", sched.procs[prev].name, sched.procs[next].name);
            &sched.procs[next].ctx
        }
        None => {
            sched.current = None;
            sched.running = false;
            log::info!("sched: returning to boot context");
            &sched.boot_ctx
        }
    };
    let prev_ctx: *mut CpuContext = &mut sched.procs[prev].ctx;

    let flags = k.unlock_keep_irqs_masked();
    // SAFETY: 两个上下文都在静态进程表中；中断已屏蔽
    unsafe { arch::context_switch(prev_ctx, next_ctx) };
    arch::local_irq_restore(flags);
}

fn check_stack(pcb: &Pcb, idx: usize) {
    if !pcb.stack.guard_intact() {
        log::error!("sched: process {} ({}) overflowed its stack", idx, pcb.name);
        error::fatal(KernelError::StackOverflow(idx));
    }
}

/// 新进程首次运行的入口（由各架构的跳板调用）
pub(crate) extern "C" fn process_entry(pid: usize) -> ! {
    // 切换时屏蔽了中断，新进程在此打开
    arch::local_irq_enable();

    let (entry, arg) = {
        let k = KERNEL.lock();
        let pcb = &k.sched.procs[pid];
        (pcb.entry, pcb.arg)
    };
    if let Some(entry) = entry {
        entry(arg);
    }
    exit_current(pid)
}

fn exit_current(pid: usize) -> ! {
    if config::EXIT_IS_FATAL {
        error::fatal(KernelError::ProcessExited(pid));
    }

    let mut k = KERNEL.lock();
    let sched = &mut k.sched;
    log::info!("sched: process {} ({}) exited", pid, sched.procs[pid].name);
    sched.procs[pid].state = ProcessState::Terminated;
    sched.live -= 1;
    schedule(k);
    unreachable!("terminated process resumed")
}

/// 重调度软件中断处理函数
pub(crate) fn resched_handler(_irq: usize) {
    preempt();
}

/// 抢占当前进程：放回就绪队列尾部并切换
fn preempt() {
    let mut k = KERNEL.lock();
    let sched = &mut k.sched;
    let Some(cur) = sched.current else {
        return;
    };
    // 空闲等待期间到达的请求没有可抢占的对象
    if sched.procs[cur].state != ProcessState::Running {
        return;
    }
    if sched.preempt_count > 0 {
        sched.resched_pending = true;
        return;
    }
    if sched.ready.is_empty() {
        return;
    }
    log::trace!("sched: preempt {}", sched.procs[cur].name);
    sched.make_ready(cur);
    schedule(k);
}

// ============================================================
// 公共接口
// ============================================================

/// 创建进程，失败时返回错误
///
/// 新进程进入就绪队列尾部；`stack` 在进程生命周期内归内核所有。
pub fn try_spawn(
    name: &'static str,
    entry: ProcessEntry,
    arg: usize,
    stack: &'static mut [u8],
) -> Result<Pid, KernelError> {
    if stack.len() < config::MIN_STACK_SIZE {
        return Err(KernelError::StackTooSmall);
    }
    if !KERNEL.lock().initialized {
        return Err(KernelError::NotInitialized);
    }

    let stack = Stack::from_slice(stack);
    // 在锁外填充，避免长时间关中断
    stack.fill();

    let pid = KERNEL.lock().sched.spawn(name, entry, arg, stack)?;
    log::debug!("sched: spawned {} as {} ({} bytes of stack)", name, pid, stack.size());
    Ok(pid)
}

/// 创建进程，失败即致命
pub fn spawn(name: &'static str, entry: ProcessEntry, arg: usize, stack: &'static mut [u8]) -> Pid {
    try_spawn(name, entry, arg, stack).unwrap_or_else(|err| error::fatal(err))
}

/// 启动调度器
///
/// 从引导上下文切换到第一个就绪进程。所有进程终止、
/// 调用 [`stop`]，或者（没有外部中断源时）所有进程永久阻塞后返回。
pub fn start() {
    let mut k = KERNEL.lock();
    if !k.initialized {
        drop(k);
        error::fatal(KernelError::NotInitialized);
    }
    if k.sched.running {
        drop(k);
        error::fatal(KernelError::SchedulerRunning);
    }

    let sched = &mut k.sched;
    let Some(first) = sched.pick_next() else {
        log::warn!("sched: start() with no ready process");
        return;
    };
    sched.running = true;
    sched.stop_requested = false;
    sched.current = Some(first);
    sched.procs[first].state = ProcessState::Running;
    sched.reset_slice();
    sched.switches += 1;
    log::info!("sched: starting with {}", sched.procs[first].name);

    let boot_ctx: *mut CpuContext = &mut sched.boot_ctx;
    let next_ctx: *const CpuContext = &sched.procs[first].ctx;
    let flags = k.unlock_keep_irqs_masked();
    // SAFETY: 同 schedule
    unsafe { arch::context_switch(boot_ctx, next_ctx) };
    arch::local_irq_restore(flags);

    log::info!("sched: stopped");
}

/// 停止调度器，控制权回到 [`start`] 的调用者
///
/// 调用进程被永久挂起。
pub fn stop() {
    assert_may_block();
    let mut k = KERNEL.lock();
    let cur = require_current(&k);
    k.sched.stop_requested = true;
    k.sched.procs[cur].state = ProcessState::Waiting;
    k.sched.procs[cur].sig_wait = Signals::empty();
    schedule(k);
}

/// 主动让出 CPU
///
/// 当前进程移到就绪队列尾部；没有其他就绪进程时立即返回。
pub fn yield_now() {
    assert_may_block();
    let mut k = KERNEL.lock();
    let cur = require_current(&k);
    if k.sched.ready.is_empty() {
        return;
    }
    k.sched.make_ready(cur);
    schedule(k);
}

/// 阻塞直到 `mask` 中任一信号到达，返回并清除到达的部分
pub(crate) fn wait_signals(mask: Signals, state: ProcessState) -> Signals {
    let mut k = KERNEL.lock();
    loop {
        let cur = require_current(&k);
        let got = k.sched.take_signals(cur, mask);
        if !got.is_empty() {
            k.sched.procs[cur].sig_wait = Signals::empty();
            return got;
        }
        let pcb = &mut k.sched.procs[cur];
        pcb.sig_wait = mask;
        pcb.state = state;
        schedule(k);
        k = KERNEL.lock();
    }
}

fn require_current(k: &KernelState) -> usize {
    match k.sched.current {
        Some(cur) => cur,
        None => error::fatal(KernelError::NotInProcessContext),
    }
}

/// 阻塞接口的上下文检查
pub(crate) fn assert_may_block() {
    if interrupt::in_interrupt() {
        error::fatal(KernelError::BlockingInInterrupt);
    }
}

/// 当前进程
pub fn current() -> Option<Pid> {
    KERNEL.lock().sched.current.map(Pid::from_index)
}

/// 当前进程，不在进程上下文中即致命
pub fn current_pid() -> Pid {
    match current() {
        Some(pid) => pid,
        None => error::fatal(KernelError::NotInProcessContext),
    }
}

/// 进程名
pub fn name(pid: Pid) -> Option<&'static str> {
    let k = KERNEL.lock();
    let idx = k.sched.check_pid(pid).ok()?;
    Some(k.sched.procs[idx].name)
}

/// 进程状态
pub fn state(pid: Pid) -> Option<ProcessState> {
    let k = KERNEL.lock();
    let idx = k.sched.check_pid(pid).ok()?;
    Some(k.sched.procs[idx].state)
}

/// 已创建的进程数（含已终止的）
pub fn process_count() -> usize {
    KERNEL.lock().sched.nr_procs
}

/// 上下文切换次数
pub fn context_switches() -> u64 {
    KERNEL.lock().sched.switches
}

/// 调度器是否在运行
pub fn is_running() -> bool {
    KERNEL.lock().sched.running
}

/// 禁止抢占（可嵌套）
pub fn preempt_disable() {
    KERNEL.lock().sched.preempt_count += 1;
}

/// 允许抢占；禁止期间到期的时间片在此兑现
pub fn preempt_enable() {
    let pending = {
        let mut k = KERNEL.lock();
        let sched = &mut k.sched;
        kassert!(sched.preempt_count > 0, "sched: unbalanced preempt_enable");
        sched.preempt_count -= 1;
        sched.preempt_count == 0 && core::mem::take(&mut sched.resched_pending)
    };
    if !pending {
        return;
    }
    if interrupt::in_interrupt() {
        // 交给最外层 handler 退出后的重调度向量
        interrupt::request_resched();
    } else {
        preempt();
    }
}

/// 设置抢占时间片，`None` 为协作式调度
pub fn set_preemption(quantum: Option<u32>) {
    let mut k = KERNEL.lock();
    let quantum = quantum.filter(|&q| q > 0);
    k.sched.time_slice = quantum;
    k.sched.slice_left = quantum.unwrap_or(0);
    log::debug!("sched: time slice {:?}", quantum);
}

/// 当前的抢占时间片
pub fn preemption() -> Option<u32> {
    KERNEL.lock().sched.time_slice
}

/// 遍历进程表（持锁，回调内不得调用内核接口）
pub(crate) fn for_each_process(mut f: impl FnMut(Pid, &Pcb)) {
    let k = KERNEL.lock();
    for idx in 0..k.sched.nr_procs {
        f(Pid::from_index(idx), &k.sched.procs[idx]);
    }
}
