//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 进程栈
//!
//! 栈由调用者提供（静态数组或板级保留内存），内核只记录其边界。
//! spawn 时整个栈被填充为 `STACK_FILL`，之后：
//! - 从栈底向上统计仍为填充值的字节数，得到历史最大使用量（高水位）
//! - 栈底 `STACK_GUARD_BYTES` 个字节被改写，说明已经溢出

use core::ptr;

use crate::config;

/// 进程栈描述
#[derive(Debug, Clone, Copy)]
pub struct Stack {
    base: *mut u8,
    size: usize,
}

// SAFETY: 栈内存只被其属主进程和持有内核锁的代码访问
unsafe impl Send for Stack {}

impl Stack {
    pub const EMPTY: Stack = Stack {
        base: ptr::null_mut(),
        size: 0,
    };

    /// 接管一段静态内存作为进程栈
    pub fn from_slice(mem: &'static mut [u8]) -> Self {
        Self {
            base: mem.as_mut_ptr(),
            size: mem.len(),
        }
    }

    pub fn base(&self) -> usize {
        self.base as usize
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// 栈顶（栈向低地址增长）
    pub fn top(&self) -> usize {
        self.base as usize + self.size
    }

    /// `sp` 是否落在栈内（保护区之上）
    pub fn contains(&self, sp: usize) -> bool {
        sp > self.base() + config::STACK_GUARD_BYTES && sp <= self.top()
    }

    /// 用填充字节覆盖整个栈
    pub fn fill(&self) {
        // SAFETY: base..base+size 是 from_slice 接管的独占内存
        unsafe { ptr::write_bytes(self.base, config::STACK_FILL, self.size) };
    }

    /// 栈底保护区是否完好
    pub fn guard_intact(&self) -> bool {
        (0..config::STACK_GUARD_BYTES.min(self.size)).all(|i| self.byte(i) == config::STACK_FILL)
    }

    /// 从栈底起仍保持填充值的字节数
    pub fn untouched(&self) -> usize {
        (0..self.size)
            .position(|i| self.byte(i) != config::STACK_FILL)
            .unwrap_or(self.size)
    }

    /// 历史最大使用量
    pub fn high_water(&self) -> usize {
        self.size - self.untouched()
    }

    fn byte(&self, offset: usize) -> u8 {
        // SAFETY: offset < size；栈可能正被其属主修改，用 volatile 读
        unsafe { ptr::read_volatile(self.base.add(offset)) }
    }
}
