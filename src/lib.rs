//! # micro-lob
//!
//! A deterministic, single-symbol micro-exchange: a price-time priority
//! limit order book driven by a self-exciting (Hawkes) order-flow model.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: one thread owns each order book exclusively (no locks)
//! - **O(1) Operations**: cancel and amend by id run in constant time
//! - **Arena Allocation**: order records live in an index-based slab, no
//!   per-order heap allocation
//! - **Determinism**: identical request streams (and seeds) produce
//!   bit-identical trade streams and book state
//!
//! ## Architecture
//!
//! ```text
//! [Hawkes events] --> [ZI agents] --> [Engine] --> [OrderBook <-> Arena/PriceLevel]
//!                                         |
//!                                  [Trade callbacks] --> [Feed / Analytics]
//! ```

pub mod agent;
pub mod analytics;
pub mod arena;
pub mod engine;
pub mod feed;
pub mod hawkes;
pub mod order;
pub mod order_book;
pub mod price_level;
pub mod report;
pub mod sim;

// Re-exports for convenience
pub use agent::{AgentParams, ZiAgent};
pub use arena::{Arena, ArenaIndex, NULL_INDEX};
pub use engine::{Engine, EngineStats};
pub use hawkes::{HawkesParams, HawkesProcess, SidedEvent};
pub use order::{
    AmendRequest, CancelRequest, NewOrderRequest, Order, OrderId, OrderStatus, OrderType, Price,
    Quantity, SeqNum, Side, Symbol, TimeInForce, Timestamp, Trade, PRICE_MARKET,
};
pub use order_book::{BookLevel, OrderBook};
pub use sim::{SimConfig, SimulationData, Simulator};
