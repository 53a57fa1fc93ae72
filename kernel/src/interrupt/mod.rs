//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 中断分发层
//!
//! 与板级中断控制器 (PLIC/GIC) 之间的软件层：
//! - 每个向量一个 handler，未注册的向量走默认 handler（致命）
//! - 每个向量有优先级，数值越大越优先；正在运行的 handler
//!   相当于 PLIC 的阈值，只有更高优先级的向量可以嵌套
//! - 被屏蔽或优先级不够的向量记为 pending，条件满足后按优先级从高到低投递
//! - `RESCHED_IRQ` 是最低优先级的软件向量，只在所有 handler 退出后运行，
//!   用于抢占式重调度
//!
//! 板级 trap 入口只需调用 [`dispatch`]。

use crate::config;
use crate::error::{self, KernelError};
use crate::sync::IrqSpinLock;

/// 中断处理函数，参数为向量号
pub type IrqHandler = fn(usize);

#[derive(Clone, Copy)]
struct IrqLine {
    handler: IrqHandler,
    priority: u8,
    enabled: bool,
    pending: bool,
    registered: bool,
}

impl IrqLine {
    const DEFAULT: IrqLine = IrqLine {
        handler: unhandled_irq,
        priority: config::DEFAULT_IRQ_PRIORITY,
        enabled: true,
        pending: false,
        registered: false,
    };
}

struct Controller {
    lines: [IrqLine; config::NR_IRQS],
    initialized: bool,
    /// 正在运行的 handler 层数
    nesting: usize,
    /// 正在运行的 handler 的优先级
    running: Option<u8>,
}

impl Controller {
    const fn new() -> Self {
        Self {
            lines: [IrqLine::DEFAULT; config::NR_IRQS],
            initialized: false,
            nesting: 0,
            running: None,
        }
    }

    fn line_mut(&mut self, irq: usize) -> Result<&mut IrqLine, KernelError> {
        if !self.initialized {
            return Err(KernelError::NotInitialized);
        }
        self.lines.get_mut(irq).ok_or(KernelError::InvalidIrq(irq))
    }

    /// 选出下一个可投递的向量并进入其 handler
    fn begin_next(&mut self) -> Option<(usize, IrqHandler, Option<u8>)> {
        let floor = self.running;
        let mut best: Option<usize> = None;
        for (irq, line) in self.lines.iter().enumerate() {
            if irq == config::RESCHED_IRQ || !line.pending || !line.enabled {
                continue;
            }
            if floor.is_some_and(|p| line.priority <= p) {
                continue;
            }
            if best.map_or(true, |b| line.priority > self.lines[b].priority) {
                best = Some(irq);
            }
        }

        let irq = best?;
        let saved = self.running;
        let line = &mut self.lines[irq];
        line.pending = false;
        self.running = Some(line.priority);
        self.nesting += 1;
        Some((irq, line.handler, saved))
    }

    fn end(&mut self, saved: Option<u8>) {
        self.nesting -= 1;
        self.running = saved;
    }

    fn take_resched(&mut self) -> Option<IrqHandler> {
        if self.nesting > 0 {
            return None;
        }
        let line = &mut self.lines[config::RESCHED_IRQ];
        if line.pending && line.enabled {
            line.pending = false;
            Some(line.handler)
        } else {
            None
        }
    }
}

static INTC: IrqSpinLock<Controller> = IrqSpinLock::new(Controller::new());

/// 默认 handler
fn unhandled_irq(irq: usize) {
    log::error!("interrupt: unhandled interrupt vector {}", irq);
    error::fatal(KernelError::UnhandledIrq(irq));
}

/// 初始化中断分发层，所有向量恢复默认 handler
pub fn init() {
    let mut intc = INTC.lock();
    if intc.initialized {
        drop(intc);
        error::fatal(KernelError::AlreadyInitialized);
    }
    *intc = Controller::new();
    intc.initialized = true;
    intc.lines[config::RESCHED_IRQ].priority = 0;
    log::debug!("interrupt: {} vectors", config::NR_IRQS);
}

#[cfg(test)]
pub(crate) fn reset() {
    *INTC.lock() = Controller::new();
}

/// 注册 handler
pub fn try_set_handler(irq: usize, handler: IrqHandler) -> Result<(), KernelError> {
    let mut intc = INTC.lock();
    let line = intc.line_mut(irq)?;
    let replaced = line.registered;
    line.handler = handler;
    line.registered = true;
    drop(intc);

    if replaced {
        log::warn!("interrupt: replacing handler of vector {}", irq);
    } else {
        log::debug!("interrupt: handler registered for vector {}", irq);
    }
    Ok(())
}

pub fn set_handler(irq: usize, handler: IrqHandler) {
    try_set_handler(irq, handler).unwrap_or_else(|err| error::fatal(err))
}

/// 恢复默认 handler
pub fn clear_handler(irq: usize) {
    let result = INTC.lock().line_mut(irq).map(|line| {
        line.handler = unhandled_irq;
        line.registered = false;
    });
    result.unwrap_or_else(|err| error::fatal(err));
}

/// 设置向量优先级（数值越大越优先）
pub fn set_priority(irq: usize, priority: u8) {
    let result = INTC.lock().line_mut(irq).map(|line| line.priority = priority);
    result.unwrap_or_else(|err| error::fatal(err));
}

/// 屏蔽向量；期间到达的中断保持 pending
pub fn disable(irq: usize) {
    let result = INTC.lock().line_mut(irq).map(|line| line.enabled = false);
    result.unwrap_or_else(|err| error::fatal(err));
}

/// 解除屏蔽并投递 pending 的中断
pub fn enable(irq: usize) {
    let result = INTC.lock().line_mut(irq).map(|line| {
        line.enabled = true;
        line.pending
    });
    if result.unwrap_or_else(|err| error::fatal(err)) {
        deliver_pending();
    }
}

/// 向量是否 pending
pub fn is_pending(irq: usize) -> bool {
    let intc = INTC.lock();
    intc.lines.get(irq).is_some_and(|line| line.pending)
}

/// 是否在中断处理函数中
pub fn in_interrupt() -> bool {
    INTC.lock().nesting > 0
}

/// 当前 handler 嵌套层数
pub fn nesting() -> usize {
    INTC.lock().nesting
}

/// 请求一次重调度（在最外层 handler 退出后执行）
pub(crate) fn request_resched() {
    INTC.lock().lines[config::RESCHED_IRQ].pending = true;
}

/// 中断入口：标记 `irq` pending 并投递所有可投递的中断
pub fn dispatch(irq: usize) {
    let result = INTC.lock().line_mut(irq).map(|line| line.pending = true);
    result.unwrap_or_else(|err| error::fatal(err));
    deliver_pending();
}

fn deliver_pending() {
    loop {
        let next = INTC.lock().begin_next();
        let Some((irq, handler, saved)) = next else {
            break;
        };
        handler(irq);
        INTC.lock().end(saved);
    }

    let resched = INTC.lock().take_resched();
    if let Some(handler) = resched {
        handler(config::RESCHED_IRQ);
    }
}
