//! Order Book - the central limit order book with price-time priority.
//!
//! Two ordered maps of price levels (bids and asks) plus an id index for
//! O(1) cancel/amend lookup. The matching algorithm scans the contra side
//! from its best price outward and walks each level's FIFO from the head.
//!
//! The book owns the arena; the id index and price levels hold non-owning
//! arena indices. Order records are released back to the arena on terminal
//! transitions; callbacks always receive a copy taken before release.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::arena::{Arena, ArenaIndex, NULL_INDEX};
use crate::order::{
    AmendRequest, NewOrderRequest, Order, OrderId, OrderStatus, OrderType, Price, Quantity, SeqNum,
    Side, Symbol, Timestamp, Trade, PRICE_MARKET,
};
use crate::price_level::PriceLevel;

/// Trade callback: invoked synchronously for each execution.
pub type TradeCallback = Box<dyn FnMut(&Trade)>;

/// Order update callback: invoked at status transitions.
pub type OrderCallback = Box<dyn FnMut(&Order)>;

/// One row of a book snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookLevel {
    pub price: Price,
    pub quantity: Quantity,
    pub order_count: u32,
}

/// Central limit order book for one symbol.
pub struct OrderBook {
    symbol: Symbol,
    arena: Arena,
    /// Bid levels; the greatest key is the best bid.
    bids: BTreeMap<Price, PriceLevel>,
    /// Ask levels; the least key is the best ask.
    asks: BTreeMap<Price, PriceLevel>,
    /// OrderId -> arena index, for O(1) cancel/amend.
    index: FxHashMap<OrderId, ArenaIndex>,
    /// Strictly monotonic; shared between order entry and trades.
    next_sequence: SeqNum,
    /// Logical clock, advanced by the driver.
    clock: Timestamp,

    trade_count: u64,
    total_volume: u64,

    trade_callback: Option<TradeCallback>,
    order_callback: Option<OrderCallback>,
}

impl OrderBook {
    pub fn new(symbol: Symbol) -> Self {
        Self::with_capacity(symbol, 65_536)
    }

    /// Create a book with a pre-sized arena.
    pub fn with_capacity(symbol: Symbol, orders: u32) -> Self {
        Self {
            symbol,
            arena: Arena::with_capacity(orders),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: FxHashMap::default(),
            next_sequence: 1,
            clock: 0,
            trade_count: 0,
            total_volume: 0,
            trade_callback: None,
            order_callback: None,
        }
    }

    // ========================================================================
    // Order operations
    // ========================================================================

    /// Submit a new order: match against the contra side, then rest or
    /// cancel the remainder according to the order type.
    ///
    /// Returns a snapshot of the order after processing.
    pub fn add_order(&mut self, req: &NewOrderRequest) -> Order {
        debug_assert!(
            !self.index.contains_key(&req.id),
            "duplicate order id {}",
            req.id
        );

        let idx = self.arena.alloc();
        let seq = self.next_sequence;
        self.next_sequence += 1;
        {
            let now = self.clock;
            let order = self.arena.get_mut(idx);
            order.id = req.id;
            order.sequence = seq;
            order.side = req.side;
            order.order_type = req.order_type;
            order.tif = req.tif;
            order.price = req.price;
            order.quantity = req.quantity;
            order.filled_qty = 0;
            order.leaves_qty = req.quantity;
            order.entry_time = now;
            order.last_update = now;
            order.status = OrderStatus::New;
            order.symbol = req.symbol;
        }
        self.index.insert(req.id, idx);

        self.match_incoming(idx);

        let leaves = self.arena.get(idx).leaves_qty;
        if leaves == 0 {
            // Fully filled on entry: drop from the id index right away
            self.index.remove(&req.id);
            let copy = *self.arena.get(idx);
            self.arena.free(idx);
            return copy;
        }

        match req.order_type {
            OrderType::Limit => {
                self.rest(idx);
                let copy = *self.arena.get(idx);
                if let Some(cb) = self.order_callback.as_mut() {
                    cb(&copy);
                }
                copy
            }
            OrderType::Market | OrderType::IOC | OrderType::FOK => {
                // Unfilled remainder is cancelled. For FOK the pre-check
                // guarantees no fills occurred on this path.
                let now = self.clock;
                self.arena.get_mut(idx).cancel(now);
                self.index.remove(&req.id);
                let copy = *self.arena.get(idx);
                self.arena.free(idx);
                if let Some(cb) = self.order_callback.as_mut() {
                    cb(&copy);
                }
                copy
            }
        }
    }

    /// Cancel a resting order. O(1) lookup + O(1) unlink.
    ///
    /// Returns `false` for unknown or inactive ids; no mutation occurs.
    pub fn cancel_order(&mut self, id: OrderId) -> bool {
        let Some(&idx) = self.index.get(&id) else {
            return false;
        };
        if !self.arena.get(idx).is_active() {
            return false;
        }

        self.unlink(idx);

        let now = self.clock;
        self.arena.get_mut(idx).cancel(now);
        self.index.remove(&id);
        let copy = *self.arena.get(idx);
        self.arena.free(idx);

        if let Some(cb) = self.order_callback.as_mut() {
            cb(&copy);
        }
        true
    }

    /// Amend price and/or quantity (0 = unchanged).
    ///
    /// A price change or a quantity increase loses queue priority: the order
    /// is unlinked, gets a fresh sequence number (immediately after unlink,
    /// before re-match), re-enters the match cycle, and rests at the tail of
    /// its new queue. A pure quantity reduction preserves priority.
    pub fn amend_order(&mut self, req: &AmendRequest) -> bool {
        let Some(&idx) = self.index.get(&req.order_id) else {
            return false;
        };
        if !self.arena.get(idx).is_active() {
            return false;
        }

        let (cur_price, cur_leaves) = {
            let order = self.arena.get(idx);
            (order.price, order.leaves_qty)
        };
        let price_changed = req.new_price != 0 && req.new_price != cur_price;
        let qty_increased = req.new_quantity != 0 && req.new_quantity > cur_leaves;

        if price_changed || qty_increased {
            self.unlink(idx);
            let seq = self.next_sequence;
            self.next_sequence += 1;
            {
                let now = self.clock;
                let order = self.arena.get_mut(idx);
                if req.new_price != 0 {
                    order.price = req.new_price;
                }
                if req.new_quantity != 0 {
                    order.quantity = req.new_quantity;
                    order.leaves_qty = req.new_quantity.saturating_sub(order.filled_qty);
                }
                order.sequence = seq;
                order.status = OrderStatus::Amended;
                order.last_update = now;
            }

            self.match_incoming(idx);

            let (leaves, order_type) = {
                let order = self.arena.get(idx);
                (order.leaves_qty, order.order_type)
            };
            if leaves > 0 && order_type == OrderType::Limit {
                self.rest(idx);
            } else if leaves == 0 {
                // Filled during the re-match
                self.index.remove(&req.order_id);
                let copy = *self.arena.get(idx);
                self.arena.free(idx);
                if let Some(cb) = self.order_callback.as_mut() {
                    cb(&copy);
                }
                return true;
            }
        } else if req.new_quantity != 0 && req.new_quantity < cur_leaves {
            let reduction = cur_leaves - req.new_quantity;
            {
                let now = self.clock;
                let order = self.arena.get_mut(idx);
                order.leaves_qty = req.new_quantity;
                order.quantity -= reduction;
                order.status = OrderStatus::Amended;
                order.last_update = now;
            }
            let (side, price) = {
                let order = self.arena.get(idx);
                (order.side, order.price)
            };
            let levels = match side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            if let Some(level) = levels.get_mut(&price) {
                level.reduce_quantity(reduction);
            }
        }
        // An amend that changes nothing still succeeds

        let copy = *self.arena.get(idx);
        if let Some(cb) = self.order_callback.as_mut() {
            cb(&copy);
        }
        true
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Match the incoming order against the contra side, best level first.
    fn match_incoming(&mut self, inc_idx: ArenaIndex) {
        if self.arena.get(inc_idx).order_type == OrderType::FOK
            && !self.can_fill_completely(inc_idx)
        {
            return;
        }

        loop {
            let (side, limit, leaves) = {
                let inc = self.arena.get(inc_idx);
                (inc.side, inc.price, inc.leaves_qty)
            };
            if leaves == 0 {
                break;
            }

            let best = match side {
                Side::Buy => self.asks.keys().next().copied(),
                Side::Sell => self.bids.keys().next_back().copied(),
            };
            let Some(level_price) = best else {
                break;
            };

            let crosses = limit == PRICE_MARKET
                || match side {
                    Side::Buy => limit >= level_price,
                    Side::Sell => limit <= level_price,
                };
            if !crosses {
                // Contra side is sorted; no further level can cross
                break;
            }

            self.match_at_level(inc_idx, level_price, side.opposite());

            let contra = match side {
                Side::Buy => &mut self.asks,
                Side::Sell => &mut self.bids,
            };
            if contra.get(&level_price).is_some_and(|l| l.is_empty()) {
                contra.remove(&level_price);
            }
        }
    }

    /// Walk one level's FIFO from the head while the incoming order has
    /// leaves, emitting a trade per fill.
    fn match_at_level(&mut self, inc_idx: ArenaIndex, price: Price, maker_side: Side) {
        loop {
            let (inc_id, inc_side, inc_leaves) = {
                let inc = self.arena.get(inc_idx);
                (inc.id, inc.side, inc.leaves_qty)
            };
            if inc_leaves == 0 {
                break;
            }

            let level = match maker_side {
                Side::Buy => self.bids.get_mut(&price),
                Side::Sell => self.asks.get_mut(&price),
            };
            let Some(level) = level else {
                break;
            };
            let resting_idx = level.front();
            if resting_idx == NULL_INDEX {
                break;
            }

            let resting = *self.arena.get(resting_idx);
            let fill = inc_leaves.min(resting.leaves_qty);

            // Keep the cached aggregate in sync BEFORE mutating leaves_qty:
            // the aggregate tracks leaves of still-linked orders.
            level.reduce_quantity(fill);

            let seq = self.next_sequence;
            self.next_sequence += 1;
            let (buy_order_id, sell_order_id) = match inc_side {
                Side::Buy => (inc_id, resting.id),
                Side::Sell => (resting.id, inc_id),
            };
            let trade = Trade {
                sequence: seq,
                buy_order_id,
                sell_order_id,
                // The resting order's price: improvement goes to the aggressor
                price: resting.price,
                quantity: fill,
                exec_time: self.clock,
                aggressor: inc_side,
                symbol: self.symbol,
            };

            let now = self.clock;
            self.arena.get_mut(inc_idx).fill(fill, now);
            self.arena.get_mut(resting_idx).fill(fill, now);

            self.trade_count += 1;
            self.total_volume += fill;

            if let Some(cb) = self.trade_callback.as_mut() {
                cb(&trade);
            }
            let resting_after = *self.arena.get(resting_idx);
            if let Some(cb) = self.order_callback.as_mut() {
                cb(&resting_after);
            }

            if resting_after.leaves_qty == 0 {
                let level = match maker_side {
                    Side::Buy => self.bids.get_mut(&price),
                    Side::Sell => self.asks.get_mut(&price),
                };
                if let Some(level) = level {
                    level.pop_front(&mut self.arena);
                }
                self.index.remove(&resting_after.id);
                self.arena.free(resting_idx);
            }
        }
    }

    /// FOK pre-check: can the incoming order be filled in full? Walks the
    /// contra side in match order, summing level aggregates while the price
    /// test holds, stopping early once the sum covers the order.
    fn can_fill_completely(&self, inc_idx: ArenaIndex) -> bool {
        let inc = self.arena.get(inc_idx);
        let mut needed = inc.leaves_qty;

        match inc.side {
            Side::Buy => {
                for (&price, level) in self.asks.iter() {
                    if inc.price != PRICE_MARKET && inc.price < price {
                        break;
                    }
                    needed = needed.saturating_sub(level.total_quantity());
                    if needed == 0 {
                        return true;
                    }
                }
            }
            Side::Sell => {
                for (&price, level) in self.bids.iter().rev() {
                    if inc.price != PRICE_MARKET && inc.price > price {
                        break;
                    }
                    needed = needed.saturating_sub(level.total_quantity());
                    if needed == 0 {
                        return true;
                    }
                }
            }
        }
        needed == 0
    }

    // ========================================================================
    // Book management
    // ========================================================================

    /// Append the order to the tail of its side's level, creating the level
    /// if needed.
    fn rest(&mut self, idx: ArenaIndex) {
        let (side, price) = {
            let order = self.arena.get(idx);
            (order.side, order.price)
        };
        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let level = levels.entry(price).or_insert_with(|| PriceLevel::new(price));
        level.push_back(&mut self.arena, idx);
    }

    /// Unlink the order from its level, dropping the level if emptied.
    fn unlink(&mut self, idx: ArenaIndex) {
        let (side, price) = {
            let order = self.arena.get(idx);
            (order.side, order.price)
        };
        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if let Some(level) = levels.get_mut(&price) {
            if level.remove(&mut self.arena, idx) {
                levels.remove(&price);
            }
        }
    }

    // ========================================================================
    // Book state queries
    // ========================================================================

    #[inline]
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.keys().next_back().copied()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.keys().next().copied()
    }

    #[inline]
    pub fn midprice(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bb), Some(ba)) => Some((bb + ba) / 2),
            _ => None,
        }
    }

    #[inline]
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bb), Some(ba)) => Some(ba - bb),
            _ => None,
        }
    }

    /// Total resting quantity on the bid side (`levels` = 0 for all levels).
    pub fn bid_depth(&self, levels: usize) -> Quantity {
        side_depth(self.bids.values().rev(), levels)
    }

    /// Total resting quantity on the ask side (`levels` = 0 for all levels).
    pub fn ask_depth(&self, levels: usize) -> Quantity {
        side_depth(self.asks.values(), levels)
    }

    /// Snapshot of the top `max_levels` bid levels, best first.
    pub fn get_bids(&self, max_levels: usize) -> Vec<BookLevel> {
        self.bids
            .values()
            .rev()
            .take(max_levels)
            .map(level_row)
            .collect()
    }

    /// Snapshot of the top `max_levels` ask levels, best first.
    pub fn get_asks(&self, max_levels: usize) -> Vec<BookLevel> {
        self.asks.values().take(max_levels).map(level_row).collect()
    }

    /// Copies of the orders resting at one level, FIFO order.
    pub fn level_orders(&self, side: Side, price: Price) -> Vec<Order> {
        let levels = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        levels
            .get(&price)
            .map(|level| level.iter(&self.arena).copied().collect())
            .unwrap_or_default()
    }

    /// Look up an active order by id.
    #[inline]
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.index.get(&id).map(|&idx| self.arena.get(idx))
    }

    /// Ids and prices of all resting orders (for cancel sweeps).
    pub fn resting_orders(&self) -> Vec<(OrderId, Price)> {
        self.index
            .values()
            .map(|&idx| {
                let order = self.arena.get(idx);
                (order.id, order.price)
            })
            .collect()
    }

    // ========================================================================
    // Callbacks and statistics
    // ========================================================================

    pub fn set_trade_callback(&mut self, cb: TradeCallback) {
        self.trade_callback = Some(cb);
    }

    pub fn set_order_callback(&mut self, cb: OrderCallback) {
        self.order_callback = Some(cb);
    }

    /// Advance the book's logical clock.
    #[inline]
    pub fn set_time(&mut self, now: Timestamp) {
        self.clock = now;
    }

    #[inline]
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    #[inline]
    pub fn trade_count(&self) -> u64 {
        self.trade_count
    }

    #[inline]
    pub fn total_volume(&self) -> u64 {
        self.total_volume
    }

    #[inline]
    pub fn sequence(&self) -> SeqNum {
        self.next_sequence
    }

    #[inline]
    pub fn active_orders(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    #[inline]
    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    // ========================================================================
    // Invariant checks (the regression guard; fatal on failure in tests)
    // ========================================================================

    /// If both sides are non-empty, `best_bid < best_ask`.
    pub fn check_no_crossed_book(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bb), Some(ba)) => bb < ba,
            _ => true,
        }
    }

    /// Within each level: prices match the level and sequence numbers are
    /// strictly ascending in link order.
    pub fn check_fifo(&self) -> bool {
        let check_side = |levels: &BTreeMap<Price, PriceLevel>| {
            levels.values().all(|level| {
                let mut prev_seq = 0;
                level.iter(&self.arena).all(|order| {
                    let ok = order.price == level.price() && order.sequence > prev_seq;
                    prev_seq = order.sequence;
                    ok
                })
            })
        };
        check_side(&self.bids) && check_side(&self.asks)
    }

    /// Cached level aggregates equal the sums over linked orders.
    pub fn check_level_accounting(&self) -> bool {
        let check_side = |levels: &BTreeMap<Price, PriceLevel>| {
            levels.values().all(|level| {
                let (qty, count) = level
                    .iter(&self.arena)
                    .fold((0u64, 0u32), |(q, c), o| (q + o.leaves_qty, c + 1));
                qty == level.total_quantity() && count == level.order_count()
            })
        };
        check_side(&self.bids) && check_side(&self.asks)
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("symbol", &self.symbol)
            .field("best_bid", &self.best_bid())
            .field("best_ask", &self.best_ask())
            .field("bid_levels", &self.bids.len())
            .field("ask_levels", &self.asks.len())
            .field("active_orders", &self.index.len())
            .finish()
    }
}

fn level_row(level: &PriceLevel) -> BookLevel {
    BookLevel {
        price: level.price(),
        quantity: level.total_quantity(),
        order_count: level.order_count(),
    }
}

fn side_depth<'a>(levels: impl Iterator<Item = &'a PriceLevel>, max_levels: usize) -> Quantity {
    let mut total = 0;
    for (i, level) in levels.enumerate() {
        total += level.total_quantity();
        if max_levels > 0 && i + 1 >= max_levels {
            break;
        }
    }
    total
}
