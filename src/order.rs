//! Core order-entry types: requests in, orders and trades out.
//!
//! Prices are signed integers in ticks; `PRICE_MARKET` (0) means "no price
//! limit". Timestamps are logical simulation time in nanoseconds, assigned
//! by the book's clock, so replays are bit-identical.

use std::fmt;

use crate::arena::{ArenaIndex, NULL_INDEX};

/// Price in ticks (1 tick = 0.01 USD by default).
pub type Price = i64;
/// Order quantity in shares.
pub type Quantity = u64;
/// Client-assigned order identifier.
pub type OrderId = u64;
/// Book-assigned sequence number, strictly monotonic, never reused.
pub type SeqNum = u64;
/// Logical simulation time in nanoseconds.
pub type Timestamp = u64;

/// Sentinel price for market orders (no price limit).
pub const PRICE_MARKET: Price = 0;

/// Order side (Buy = bid, Sell = ask)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "B"),
            Side::Sell => write!(f, "S"),
        }
    }
}

/// Order type determines matching behavior
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OrderType {
    /// Limit order - rests in book if not fully matched (default)
    #[default]
    Limit = 0,
    /// Market order - no price limit, cancel any unfilled remainder
    Market = 1,
    /// Immediate-Or-Cancel - cancel any unfilled portion immediately
    IOC = 2,
    /// Fill-Or-Kill - all-or-nothing execution, cancel if it can't fully fill
    FOK = 3,
}

/// Time in force
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TimeInForce {
    /// Good till cancel (default)
    #[default]
    GTC = 0,
    IOC = 1,
    FOK = 2,
    /// Day order. Session expiry is represented but not enforced.
    Day = 3,
}

/// Order lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OrderStatus {
    New = 0,
    PartiallyFilled = 1,
    Filled = 2,
    Cancelled = 3,
    Rejected = 4,
    Amended = 5,
}

impl OrderStatus {
    /// Terminal states never transition again.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

/// Fixed-width symbol tag (at most 15 bytes of ASCII, NUL padded).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Symbol([u8; 16]);

impl Symbol {
    /// Build a symbol from a string, truncating to 15 bytes.
    pub fn new(s: &str) -> Self {
        let mut buf = [0u8; 16];
        let n = s.len().min(15);
        buf[..n].copy_from_slice(&s.as_bytes()[..n]);
        Symbol(buf)
    }

    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(16);
        std::str::from_utf8(&self.0[..end]).unwrap_or("")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

/// The central mutable order record.
///
/// Lives in the [`Arena`](crate::arena::Arena); the id index and price
/// levels hold non-owning `ArenaIndex` handles. `prev`/`next` are used
/// exclusively by the price level's intrusive FIFO (and by the arena's
/// free list while the slot is vacant).
#[derive(Clone, Copy, Debug)]
pub struct Order {
    // ── Identity ──
    pub id: OrderId,
    /// Assigned at book entry; reassigned on a priority-losing amend.
    pub sequence: SeqNum,

    // ── Terms ──
    pub side: Side,
    pub order_type: OrderType,
    pub tif: TimeInForce,
    /// In ticks; `PRICE_MARKET` for market orders.
    pub price: Price,
    /// Original quantity.
    pub quantity: Quantity,

    // ── Accounting: filled_qty + leaves_qty == quantity while active ──
    pub filled_qty: Quantity,
    pub leaves_qty: Quantity,

    // ── Timestamps (logical) ──
    pub entry_time: Timestamp,
    pub last_update: Timestamp,

    pub status: OrderStatus,

    // ── Intrusive FIFO linkage (owned by PriceLevel) ──
    pub(crate) prev: ArenaIndex,
    pub(crate) next: ArenaIndex,

    pub symbol: Symbol,
}

impl Order {
    /// A vacant record for arena slots.
    pub(crate) const fn vacant() -> Self {
        Self {
            id: 0,
            sequence: 0,
            side: Side::Buy,
            order_type: OrderType::Limit,
            tif: TimeInForce::GTC,
            price: 0,
            quantity: 0,
            filled_qty: 0,
            leaves_qty: 0,
            entry_time: 0,
            last_update: 0,
            status: OrderStatus::New,
            prev: NULL_INDEX,
            next: NULL_INDEX,
            symbol: Symbol([0u8; 16]),
        }
    }

    #[inline]
    pub fn is_buy(&self) -> bool {
        self.side == Side::Buy
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.leaves_qty == 0
    }

    /// Active orders are the only ones that may rest or match.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::New | OrderStatus::PartiallyFilled | OrderStatus::Amended
        )
    }

    /// Apply an execution of `qty` shares.
    #[inline]
    pub(crate) fn fill(&mut self, qty: Quantity, now: Timestamp) {
        debug_assert!(qty <= self.leaves_qty);
        self.filled_qty += qty;
        self.leaves_qty -= qty;
        self.last_update = now;
        self.status = if self.leaves_qty == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }

    #[inline]
    pub(crate) fn cancel(&mut self, now: Timestamp) {
        self.status = OrderStatus::Cancelled;
        self.leaves_qty = 0;
        self.last_update = now;
    }
}

/// Immutable execution record.
///
/// `price` is the resting order's price: price improvement accrues to the
/// aggressor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trade {
    pub sequence: SeqNum,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub price: Price,
    pub quantity: Quantity,
    pub exec_time: Timestamp,
    /// Side of the incoming order that crossed the spread.
    pub aggressor: Side,
    pub symbol: Symbol,
}

// ============================================================================
// Request messages
// ============================================================================

/// Submit a new order
#[derive(Clone, Copy, Debug)]
pub struct NewOrderRequest {
    pub id: OrderId,
    pub side: Side,
    pub order_type: OrderType,
    pub tif: TimeInForce,
    /// `PRICE_MARKET` (0) for market orders.
    pub price: Price,
    pub quantity: Quantity,
    pub symbol: Symbol,
}

impl NewOrderRequest {
    /// Create a GTC limit order (most common case)
    #[inline]
    pub fn limit(id: OrderId, side: Side, price: Price, quantity: Quantity, symbol: Symbol) -> Self {
        Self {
            id,
            side,
            order_type: OrderType::Limit,
            tif: TimeInForce::GTC,
            price,
            quantity,
            symbol,
        }
    }

    /// Create a market order (IOC semantics for the remainder)
    #[inline]
    pub fn market(id: OrderId, side: Side, quantity: Quantity, symbol: Symbol) -> Self {
        Self {
            id,
            side,
            order_type: OrderType::Market,
            tif: TimeInForce::IOC,
            price: PRICE_MARKET,
            quantity,
            symbol,
        }
    }

    /// Create an Immediate-Or-Cancel limit order
    #[inline]
    pub fn ioc(id: OrderId, side: Side, price: Price, quantity: Quantity, symbol: Symbol) -> Self {
        Self {
            id,
            side,
            order_type: OrderType::IOC,
            tif: TimeInForce::IOC,
            price,
            quantity,
            symbol,
        }
    }

    /// Create a Fill-Or-Kill order
    #[inline]
    pub fn fok(id: OrderId, side: Side, price: Price, quantity: Quantity, symbol: Symbol) -> Self {
        Self {
            id,
            side,
            order_type: OrderType::FOK,
            tif: TimeInForce::FOK,
            price,
            quantity,
            symbol,
        }
    }
}

/// Cancel an existing order
#[derive(Clone, Copy, Debug)]
pub struct CancelRequest {
    pub order_id: OrderId,
    pub symbol: Symbol,
}

/// Amend price and/or quantity; 0 means "unchanged".
#[derive(Clone, Copy, Debug)]
pub struct AmendRequest {
    pub order_id: OrderId,
    pub new_price: Price,
    pub new_quantity: Quantity,
    pub symbol: Symbol,
}
