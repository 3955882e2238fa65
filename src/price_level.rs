//! Price Level - a FIFO queue of resting orders at a single price.
//!
//! Implements a doubly-linked list using arena indices for O(1)
//! tail append, head removal, and removal from arbitrary position
//! (the cancel path). The level caches the aggregate resting quantity
//! and order count so depth queries never walk the list.

use crate::arena::{Arena, ArenaIndex, NULL_INDEX};
use crate::order::{Order, Price, Quantity};

/// A queue of orders at a specific price level.
///
/// Orders are matched in FIFO order (price-time priority).
///
/// Invariants:
/// - all linked orders have `price == self.price`
/// - link order equals sequence order, strictly ascending
/// - `total_quantity` equals the sum of `leaves_qty` over linked orders
/// - `order_count` equals the number of linked orders
#[derive(Clone, Copy, Debug)]
pub struct PriceLevel {
    price: Price,
    /// Index of the oldest order (highest priority, first to match)
    head: ArenaIndex,
    /// Index of the newest order (last to match)
    tail: ArenaIndex,
    total_quantity: Quantity,
    order_count: u32,
}

impl PriceLevel {
    #[inline]
    pub const fn new(price: Price) -> Self {
        Self {
            price,
            head: NULL_INDEX,
            tail: NULL_INDEX,
            total_quantity: 0,
            order_count: 0,
        }
    }

    #[inline]
    pub const fn price(&self) -> Price {
        self.price
    }

    #[inline]
    pub const fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    #[inline]
    pub const fn order_count(&self) -> u32 {
        self.order_count
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    /// Index of the head order, or `NULL_INDEX` if empty.
    #[inline]
    pub const fn front(&self) -> ArenaIndex {
        self.head
    }

    /// Append an order to the tail of the queue (newest order).
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn push_back(&mut self, arena: &mut Arena, index: ArenaIndex) {
        debug_assert_eq!(arena.get(index).price, self.price, "price mismatch");
        let leaves = arena.get(index).leaves_qty;

        if self.tail == NULL_INDEX {
            debug_assert!(self.head == NULL_INDEX);
            self.head = index;
            self.tail = index;
            let order = arena.get_mut(index);
            order.prev = NULL_INDEX;
            order.next = NULL_INDEX;
        } else {
            arena.get_mut(self.tail).next = index;
            let order = arena.get_mut(index);
            order.prev = self.tail;
            order.next = NULL_INDEX;
            self.tail = index;
        }

        self.order_count += 1;
        self.total_quantity += leaves;
    }

    /// Remove and return the head order (oldest/highest priority).
    ///
    /// The slot is NOT released to the arena; the book does that.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn pop_front(&mut self, arena: &mut Arena) -> Option<ArenaIndex> {
        if self.head == NULL_INDEX {
            return None;
        }

        let index = self.head;
        let order = arena.get(index);
        let next_idx = order.next;
        let leaves = order.leaves_qty;

        if next_idx == NULL_INDEX {
            self.head = NULL_INDEX;
            self.tail = NULL_INDEX;
        } else {
            self.head = next_idx;
            arena.get_mut(next_idx).prev = NULL_INDEX;
        }

        self.order_count -= 1;
        self.total_quantity -= leaves;

        let order = arena.get_mut(index);
        order.prev = NULL_INDEX;
        order.next = NULL_INDEX;

        Some(index)
    }

    /// Unlink an order from anywhere in the queue (the cancel path).
    ///
    /// Handles head, tail, middle and only-node cases via the order's own
    /// prev/next handles.
    ///
    /// # Returns
    /// `true` if the level is now empty.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn remove(&mut self, arena: &mut Arena, index: ArenaIndex) -> bool {
        let order = arena.get(index);
        let prev_idx = order.prev;
        let next_idx = order.next;
        let leaves = order.leaves_qty;

        if prev_idx == NULL_INDEX && next_idx == NULL_INDEX {
            debug_assert!(self.head == index && self.tail == index);
            self.head = NULL_INDEX;
            self.tail = NULL_INDEX;
        } else if prev_idx == NULL_INDEX {
            debug_assert!(self.head == index);
            self.head = next_idx;
            arena.get_mut(next_idx).prev = NULL_INDEX;
        } else if next_idx == NULL_INDEX {
            debug_assert!(self.tail == index);
            self.tail = prev_idx;
            arena.get_mut(prev_idx).next = NULL_INDEX;
        } else {
            arena.get_mut(prev_idx).next = next_idx;
            arena.get_mut(next_idx).prev = prev_idx;
        }

        self.order_count -= 1;
        self.total_quantity -= leaves;

        let order = arena.get_mut(index);
        order.prev = NULL_INDEX;
        order.next = NULL_INDEX;

        self.order_count == 0
    }

    /// Keep the cached aggregate in sync when a linked order is partially
    /// filled. Must be called with the to-be-consumed amount BEFORE the
    /// order's `leaves_qty` is mutated: the aggregate tracks leaves of
    /// still-linked orders.
    ///
    /// Saturates at zero rather than panicking; a non-zero saturation is a
    /// bug and trips the debug assertion.
    #[inline]
    pub fn reduce_quantity(&mut self, filled: Quantity) {
        debug_assert!(
            filled <= self.total_quantity,
            "level aggregate underflow: reduce {} from {}",
            filled,
            self.total_quantity
        );
        self.total_quantity = self.total_quantity.saturating_sub(filled);
    }

    /// Read-only FIFO walk, head to tail (for snapshots and checks).
    pub fn iter<'a>(&self, arena: &'a Arena) -> LevelIter<'a> {
        LevelIter {
            arena,
            current: self.head,
        }
    }
}

/// Iterator over the orders linked into one price level.
pub struct LevelIter<'a> {
    arena: &'a Arena,
    current: ArenaIndex,
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = &'a Order;

    fn next(&mut self) -> Option<&'a Order> {
        if self.current == NULL_INDEX {
            return None;
        }
        let order = self.arena.get(self.current);
        self.current = order.next;
        Some(order)
    }
}
