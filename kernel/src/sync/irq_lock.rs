//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 关中断自旋锁
//!
//! 对应 Linux 的 spin_lock_irqsave()/spin_unlock_irqrestore()
//!
//! 单核系统上，持锁期间屏蔽中断即可保证中断处理函数不会与
//! 进程并发访问共享状态。锁不可重入：同一把锁在持有期间再次获取
//! 必然是内核缺陷，直接报告致命错误而不是自旋到死。

use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

use crate::arch::{self, IrqFlags};
use crate::error::{self, KernelError};

/// 关中断自旋锁
pub struct IrqSpinLock<T> {
    inner: spin::Mutex<T>,
}

impl<T> IrqSpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: spin::Mutex::new(value),
        }
    }

    /// 屏蔽中断并获取锁
    #[track_caller]
    pub fn lock(&self) -> IrqSpinLockGuard<'_, T> {
        let flags = arch::local_irq_save();
        match self.inner.try_lock() {
            Some(guard) => IrqSpinLockGuard {
                guard: ManuallyDrop::new(guard),
                flags,
            },
            None => {
                arch::local_irq_restore(flags);
                error::fatal(KernelError::Deadlock)
            }
        }
    }

    #[cfg(test)]
    fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

/// 持锁守卫，释放时恢复加锁前的中断状态
pub struct IrqSpinLockGuard<'a, T> {
    guard: ManuallyDrop<spin::MutexGuard<'a, T>>,
    flags: IrqFlags,
}

impl<'a, T> IrqSpinLockGuard<'a, T> {
    /// 释放锁但保持中断屏蔽，返回加锁前的中断状态
    ///
    /// 用于上下文切换：切换期间必须保持关中断，
    /// 切回后由调用者自行 `local_irq_restore`。
    pub fn unlock_keep_irqs_masked(mut self) -> IrqFlags {
        let flags = self.flags;
        // SAFETY: guard 只在这里或 Drop 中释放一次，随后 forget 跳过 Drop
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        core::mem::forget(self);
        flags
    }
}

impl<T> Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for IrqSpinLockGuard<'_, T> {
    fn drop(&mut self) {
        // 先释放锁再开中断
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        arch::local_irq_restore(self.flags);
    }
}
