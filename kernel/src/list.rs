//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 双向链表实现
//!
//! 参考 Linux: include/linux/list.h
//!
//! 用途：
//! - 调度队列: 就绪进程
//! - 定时器队列: 按到期时间排序的定时器
//!
//! 设计特点：
//! - 侵入式链表：`ListLink` 直接嵌入数据结构中
//! - 节点存放在静态数组里，链接用数组下标表示，无需堆分配
//! - 删除任意节点 O(1)
//! - 每个节点同一时刻最多在一个链表中，重复插入视为内核缺陷

use crate::kassert;

/// 嵌入在元素中的链接字段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListLink {
    next: Option<usize>,
    prev: Option<usize>,
    linked: bool,
}

impl ListLink {
    pub const fn new() -> Self {
        Self {
            next: None,
            prev: None,
            linked: false,
        }
    }

    /// 节点当前是否在某个链表中
    pub fn is_linked(&self) -> bool {
        self.linked
    }
}

/// 含有链接字段的元素
pub trait Linked {
    fn link(&self) -> &ListLink;
    fn link_mut(&mut self) -> &mut ListLink;
}

/// 链表头
#[derive(Debug, Default)]
pub struct ListHead {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl ListHead {
    /// 创建一个空链表
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// 清空链表头（不修改节点）
    pub fn init(&mut self) {
        *self = Self::new();
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn first(&self) -> Option<usize> {
        self.head
    }

    /// 在链表尾部插入
    pub fn add_tail<T: Linked>(&mut self, nodes: &mut [T], idx: usize) {
        kassert!(!nodes[idx].link().linked, "list: node {} already linked", idx);

        let link = nodes[idx].link_mut();
        link.prev = self.tail;
        link.next = None;
        link.linked = true;

        match self.tail {
            Some(tail) => nodes[tail].link_mut().next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;
    }

    /// 在 `pos` 之前插入 `idx`
    pub fn insert_before<T: Linked>(&mut self, nodes: &mut [T], pos: usize, idx: usize) {
        kassert!(!nodes[idx].link().linked, "list: node {} already linked", idx);
        kassert!(nodes[pos].link().linked, "list: position {} not linked", pos);

        let prev = nodes[pos].link().prev;
        {
            let link = nodes[idx].link_mut();
            link.prev = prev;
            link.next = Some(pos);
            link.linked = true;
        }
        nodes[pos].link_mut().prev = Some(idx);
        match prev {
            Some(p) => nodes[p].link_mut().next = Some(idx),
            None => self.head = Some(idx),
        }
        self.len += 1;
    }

    /// 从链表中删除节点
    pub fn del<T: Linked>(&mut self, nodes: &mut [T], idx: usize) {
        kassert!(nodes[idx].link().linked, "list: node {} not linked", idx);

        let ListLink { next, prev, .. } = *nodes[idx].link();
        match prev {
            Some(p) => nodes[p].link_mut().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => nodes[n].link_mut().prev = prev,
            None => self.tail = prev,
        }
        *nodes[idx].link_mut() = ListLink::new();
        self.len -= 1;
    }

    /// 删除并返回第一个节点
    pub fn pop_front<T: Linked>(&mut self, nodes: &mut [T]) -> Option<usize> {
        let idx = self.head?;
        self.del(nodes, idx);
        Some(idx)
    }

    /// 按链表顺序遍历下标
    pub fn iter<'a, T: Linked>(&self, nodes: &'a [T]) -> Iter<'a, T> {
        Iter {
            nodes,
            cursor: self.head,
        }
    }
}

pub struct Iter<'a, T> {
    nodes: &'a [T],
    cursor: Option<usize>,
}

impl<T: Linked> Iterator for Iter<'_, T> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let idx = self.cursor?;
        self.cursor = self.nodes[idx].link().next;
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[derive(Default)]
    struct Node {
        link: ListLink,
    }

    impl Linked for Node {
        fn link(&self) -> &ListLink {
            &self.link
        }
        fn link_mut(&mut self) -> &mut ListLink {
            &mut self.link
        }
    }

    fn nodes(n: usize) -> Vec<Node> {
        (0..n).map(|_| Node::default()).collect()
    }

    fn collect(head: &ListHead, nodes: &[Node]) -> Vec<usize> {
        head.iter(nodes).collect()
    }

    #[test]
    fn test_list_init() {
        let mut head = ListHead::new();
        head.init();
        assert!(head.is_empty());
        assert_eq!(head.len(), 0);
        assert_eq!(head.first(), None);
    }

    #[test]
    fn test_list_add_tail_keeps_fifo_order() {
        let mut nodes = nodes(3);
        let mut head = ListHead::new();
        head.add_tail(&mut nodes, 2);
        head.add_tail(&mut nodes, 0);
        head.add_tail(&mut nodes, 1);
        assert_eq!(collect(&head, &nodes), [2, 0, 1]);
        assert_eq!(head.first(), Some(2));
        assert_eq!(head.len(), 3);
    }

    #[test]
    fn test_list_del_middle_head_tail() {
        let mut nodes = nodes(4);
        let mut head = ListHead::new();
        for i in 0..4 {
            head.add_tail(&mut nodes, i);
        }
        head.del(&mut nodes, 1);
        assert_eq!(collect(&head, &nodes), [0, 2, 3]);
        head.del(&mut nodes, 0);
        assert_eq!(collect(&head, &nodes), [2, 3]);
        head.del(&mut nodes, 3);
        assert_eq!(collect(&head, &nodes), [2]);
        assert!(!nodes[1].link.is_linked());
        assert_eq!(head.pop_front(&mut nodes), Some(2));
        assert!(head.is_empty());
        assert_eq!(head.first(), None);
    }

    #[test]
    fn test_list_insert_before() {
        let mut nodes = nodes(4);
        let mut head = ListHead::new();
        head.add_tail(&mut nodes, 0);
        head.add_tail(&mut nodes, 1);
        head.insert_before(&mut nodes, 1, 2);
        head.insert_before(&mut nodes, 0, 3);
        assert_eq!(collect(&head, &nodes), [3, 0, 2, 1]);
        assert_eq!(nodes[0].link.next, Some(2));
    }

    #[test]
    fn test_list_relink_after_del() {
        let mut nodes = nodes(2);
        let mut head = ListHead::new();
        head.add_tail(&mut nodes, 0);
        head.del(&mut nodes, 0);
        head.add_tail(&mut nodes, 0);
        assert_eq!(collect(&head, &nodes), [0]);
    }

    #[test]
    #[should_panic(expected = "already linked")]
    fn test_list_double_insert_is_fatal() {
        let mut nodes = nodes(1);
        let mut head = ListHead::new();
        head.add_tail(&mut nodes, 0);
        head.add_tail(&mut nodes, 0);
    }
}
