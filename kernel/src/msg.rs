//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 消息端口
//!
//! 端口是一个 FIFO 消息队列，属于某个进程并绑定一个信号位：
//! - `put` 把消息挂到队尾并向属主投递信号，从不阻塞
//! - `get` 由属主调用，队列为空时等待信号
//! - `reply` 把消息送回其应答端口
//!
//! 消息不拷贝：所有权以 `&'static mut Msg<T>` 的形式在发送者、
//! 端口和接收者之间转移，同一时刻只在一处。

use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

use crate::error::{self, KernelError};
use crate::process::Pid;
use crate::sched;
use crate::signal::{self, Signals};
use crate::sync::IrqSpinLock;

/// 消息
///
/// 负载通过 `Deref` 直接访问
pub struct Msg<T: 'static> {
    next: Option<NonNull<Msg<T>>>,
    reply_port: Option<&'static MsgPort<T>>,
    pub payload: T,
}

impl<T: 'static> Msg<T> {
    pub const fn new(reply_port: Option<&'static MsgPort<T>>, payload: T) -> Self {
        Self {
            next: None,
            reply_port,
            payload,
        }
    }

    pub fn reply_port(&self) -> Option<&'static MsgPort<T>> {
        self.reply_port
    }

    pub fn set_reply_port(&mut self, port: Option<&'static MsgPort<T>>) {
        self.reply_port = port;
    }
}

impl<T> Deref for Msg<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.payload
    }
}

impl<T> DerefMut for Msg<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.payload
    }
}

struct PortState<T: 'static> {
    head: Option<NonNull<Msg<T>>>,
    tail: Option<NonNull<Msg<T>>>,
    len: usize,
    owner: Option<(Pid, Signals)>,
}

// SAFETY: 队列中的消息只能通过端口访问，端口状态由锁保护
unsafe impl<T: Send> Send for PortState<T> {}

impl<T> PortState<T> {
    fn push(&mut self, msg: &'static mut Msg<T>) {
        msg.next = None;
        let node = NonNull::from(msg);
        match self.tail {
            // SAFETY: tail 指向队列中的消息，由端口独占
            Some(mut tail) => unsafe { tail.as_mut().next = Some(node) },
            None => self.head = Some(node),
        }
        self.tail = Some(node);
        self.len += 1;
    }

    fn pop(&mut self) -> Option<&'static mut Msg<T>> {
        let mut node = self.head?;
        // SAFETY: 出队后消息的唯一引用交还给调用者
        let msg = unsafe { node.as_mut() };
        self.head = msg.next.take();
        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        Some(msg)
    }
}

/// 消息端口
pub struct MsgPort<T: 'static> {
    state: IrqSpinLock<PortState<T>>,
}

impl<T: Send + 'static> MsgPort<T> {
    pub const fn new() -> Self {
        Self {
            state: IrqSpinLock::new(PortState {
                head: None,
                tail: None,
                len: 0,
                owner: None,
            }),
        }
    }

    /// 绑定属主进程与通知信号
    pub fn init(&self, owner: Pid, sig: Signals) {
        let mut state = self.state.lock();
        if state.owner.is_some() {
            drop(state);
            error::fatal(KernelError::PortAlreadyInitialized);
        }
        if sig.is_empty() {
            drop(state);
            error::fatal(KernelError::EmptyWaitMask);
        }
        if sig.intersects(Signals::DELAY | Signals::SINGLE | Signals::TIMEOUT) {
            drop(state);
            error::fatal(KernelError::ReservedSignal);
        }
        state.owner = Some((owner, sig));
        drop(state);
        log::debug!("msg: port owned by {} on {:?}", owner, sig);
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    /// 入队并通知属主，从不阻塞，可在中断上下文中调用
    pub fn put(&self, msg: &'static mut Msg<T>) {
        let owner = {
            let mut state = self.state.lock();
            let Some(owner) = state.owner else {
                drop(state);
                error::fatal(KernelError::PortNotInitialized);
            };
            state.push(msg);
            owner
        };
        signal::post(owner.0, owner.1);
    }

    /// 非阻塞出队
    pub fn try_get(&self) -> Option<&'static mut Msg<T>> {
        let (msg, more, owner) = {
            let mut state = self.state.lock();
            let msg = state.pop()?;
            (msg, state.len > 0, state.owner)
        };
        // 队列中还有消息：重新投递信号，让只等待信号的属主不会漏掉它们
        if let (true, Some((pid, sig))) = (more, owner) {
            signal::post(pid, sig);
        }
        Some(msg)
    }

    /// 出队，队列为空时阻塞等待（仅属主可调用）
    pub fn get(&self) -> &'static mut Msg<T> {
        let owner = self.state.lock().owner;
        let sig = match owner {
            Some((owner, sig)) if Some(owner) == sched::current() => sig,
            Some(_) => error::fatal(KernelError::NotPortOwner),
            None => error::fatal(KernelError::PortNotInitialized),
        };
        loop {
            if let Some(msg) = self.try_get() {
                return msg;
            }
            signal::wait(sig);
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send + 'static> Default for MsgPort<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 初始化端口
pub fn init_port<T: Send>(port: &'static MsgPort<T>, owner: Pid, sig: Signals) {
    port.init(owner, sig);
}

/// 发送消息
pub fn put<T: Send>(port: &'static MsgPort<T>, msg: &'static mut Msg<T>) {
    port.put(msg);
}

/// 接收消息
pub fn get<T: Send>(port: &'static MsgPort<T>) -> &'static mut Msg<T> {
    port.get()
}

/// 把消息送回其应答端口；没有应答端口是致命错误
pub fn reply<T: Send>(msg: &'static mut Msg<T>) {
    match msg.reply_port {
        Some(port) => port.put(msg),
        None => error::fatal(KernelError::NoReplyPort),
    }
}
