//! Engine - multi-symbol dispatch facade over per-symbol order books.
//!
//! Locates the book for each request by symbol, keeps running counters,
//! and fans a single global trade callback into every book. There are no
//! cross-symbol operations, so the facade could be sharded by symbol
//! without locks; within one engine everything is single-threaded.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::order::{AmendRequest, CancelRequest, NewOrderRequest, Order, Symbol, Timestamp, Trade};
use crate::order_book::OrderBook;

type SharedTradeCallback = Rc<RefCell<dyn FnMut(&Trade)>>;

/// Aggregated counters across all books.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub total_orders: u64,
    pub total_cancels: u64,
    pub total_amends: u64,
    pub total_trades: u64,
    pub total_volume: u64,
    pub total_rejects: u64,
    pub active_orders: u64,
    pub symbols_active: u64,
}

/// The matching engine facade.
pub struct Engine {
    books: FxHashMap<Symbol, OrderBook>,
    total_orders: u64,
    total_cancels: u64,
    total_amends: u64,
    total_rejects: u64,
    trade_callback: Option<SharedTradeCallback>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            books: FxHashMap::default(),
            total_orders: 0,
            total_cancels: 0,
            total_amends: 0,
            total_rejects: 0,
            trade_callback: None,
        }
    }

    // ========================================================================
    // Symbol management
    // ========================================================================

    /// Register a tradeable symbol. Must be called before any orders for it.
    pub fn add_symbol(&mut self, symbol: Symbol) -> &mut OrderBook {
        let book = self
            .books
            .entry(symbol)
            .or_insert_with(|| OrderBook::new(symbol));
        if let Some(shared) = self.trade_callback.as_ref() {
            wire_trade_callback(book, shared.clone());
        }
        book
    }

    #[inline]
    pub fn get_book(&self, symbol: Symbol) -> Option<&OrderBook> {
        self.books.get(&symbol)
    }

    #[inline]
    pub fn get_book_mut(&mut self, symbol: Symbol) -> Option<&mut OrderBook> {
        self.books.get_mut(&symbol)
    }

    // ========================================================================
    // Order entry
    // ========================================================================

    /// Submit a new order to its symbol's book.
    ///
    /// Unknown symbols are rejected with no mutation; the rejects counter
    /// is incremented.
    pub fn submit_order(&mut self, req: &NewOrderRequest) -> Option<Order> {
        let Some(book) = self.books.get_mut(&req.symbol) else {
            self.total_rejects += 1;
            warn!(symbol = %req.symbol, order_id = req.id, "order for unknown symbol rejected");
            return None;
        };
        self.total_orders += 1;
        Some(book.add_order(req))
    }

    pub fn cancel_order(&mut self, req: &CancelRequest) -> bool {
        let Some(book) = self.books.get_mut(&req.symbol) else {
            self.total_rejects += 1;
            return false;
        };
        let ok = book.cancel_order(req.order_id);
        if ok {
            self.total_cancels += 1;
        }
        ok
    }

    pub fn amend_order(&mut self, req: &AmendRequest) -> bool {
        let Some(book) = self.books.get_mut(&req.symbol) else {
            self.total_rejects += 1;
            return false;
        };
        let ok = book.amend_order(req);
        if ok {
            self.total_amends += 1;
        }
        ok
    }

    /// Advance the logical clock of every book.
    pub fn set_time(&mut self, now: Timestamp) {
        for book in self.books.values_mut() {
            book.set_time(now);
        }
    }

    // ========================================================================
    // Global trade callback
    // ========================================================================

    /// Install a trade callback observing executions on every book,
    /// current and future. Fires synchronously, before the submit returns.
    pub fn set_trade_callback(&mut self, cb: impl FnMut(&Trade) + 'static) {
        let shared: SharedTradeCallback = Rc::new(RefCell::new(cb));
        for book in self.books.values_mut() {
            wire_trade_callback(book, shared.clone());
        }
        self.trade_callback = Some(shared);
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn stats(&self) -> EngineStats {
        let mut stats = EngineStats {
            total_orders: self.total_orders,
            total_cancels: self.total_cancels,
            total_amends: self.total_amends,
            total_rejects: self.total_rejects,
            symbols_active: self.books.len() as u64,
            ..EngineStats::default()
        };
        for book in self.books.values() {
            stats.total_trades += book.trade_count();
            stats.total_volume += book.total_volume();
            stats.active_orders += book.active_orders() as u64;
        }
        stats
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn wire_trade_callback(book: &mut OrderBook, shared: SharedTradeCallback) {
    book.set_trade_callback(Box::new(move |trade| {
        (&mut *shared.borrow_mut())(trade);
    }));
}
