//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 主机上的内核场景测试
//!
//! 进程在泄漏的堆内存上拥有真实的栈，通过 `cpu_switch_to` 切换；
//! 时间只在所有进程阻塞时由空闲钩子推进。
//!
//! 约定：
//! - 内核状态是全局的，所有场景测试经 [`kernel_lock`] 串行执行
//! - 进程内不做断言（进程栈上的 panic 无法展开回测试线程），
//!   结果记录到静态变量中，`start()` 返回后再检查

use std::boxed::Box;
use std::sync::{Mutex, MutexGuard};
use std::vec;
use std::vec::Vec;

mod scheduler;
mod signal;
mod timer;

static KERNEL_TEST_LOCK: Mutex<()> = Mutex::new(());

/// 串行化访问全局内核状态的测试
pub(crate) fn kernel_lock() -> MutexGuard<'static, ()> {
    // 预期 panic 的用例会毒化这把锁
    KERNEL_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// 复位并初始化内核，返回的守卫在用例结束前必须保持存活
pub(crate) fn boot() -> MutexGuard<'static, ()> {
    let guard = kernel_lock();
    crate::init::reset();
    crate::init();
    guard
}

pub(crate) const TEST_STACK_SIZE: usize = 64 * 1024;

pub(crate) fn stack() -> &'static mut [u8] {
    Box::leak(vec![0u8; TEST_STACK_SIZE].into_boxed_slice())
}

/// 进程写入、测试线程读取的事件记录
pub(crate) struct Trace<T>(Mutex<Vec<T>>);

impl<T: Clone> Trace<T> {
    pub(crate) const fn new() -> Self {
        Trace(Mutex::new(Vec::new()))
    }

    pub(crate) fn push(&self, value: T) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(value);
    }

    pub(crate) fn clear(&self) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub(crate) fn take(&self) -> Vec<T> {
        core::mem::take(&mut *self.0.lock().unwrap_or_else(|e| e.into_inner()))
    }
}
