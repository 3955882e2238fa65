//! Market-data feed: ITCH-style tagged messages and a publisher.
//!
//! The publisher sits between the matching engine and downstream
//! consumers, transforming engine events into a fixed-size wire record.
//! Messages carry the publisher's own contiguous sequence stream so
//! consumers can detect gaps. Serialization is the in-memory layout for
//! simulation; production would use network byte order.
//!
//! Hand-off to a consumer thread goes through a bounded SPSC ring
//! (`rtrb`); a full ring is a back-pressure signal, surfaced as
//! [`FeedError::QueueFull`] and counted.

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use crate::order::{Order, OrderId, OrderStatus, Price, Quantity, SeqNum, Side, Symbol, Timestamp,
    Trade};
use crate::order_book::OrderBook;

/// Default ring capacity in messages.
pub const FEED_QUEUE_SIZE: usize = 1 << 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    /// The SPSC ring is full; the consumer is falling behind.
    #[error("feed queue full")]
    QueueFull,
    /// A sequence discontinuity on the consumer side.
    #[error("feed sequence gap: expected {expected}, got {got}")]
    Gap { expected: SeqNum, got: SeqNum },
}

/// Wire message tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FeedMessageType {
    /// New resting order
    AddOrder = b'A',
    /// Order executed against
    ExecuteOrder = b'X',
    /// Order removed (cancel or full fill)
    DeleteOrder = b'D',
    /// Order replaced (amend)
    ReplaceOrder = b'U',
    /// Full top-of-book snapshot for recovery
    Snapshot = b'S',
    /// Execution report
    Trade = b'T',
    /// BBO change
    QuoteUpdate = b'Q',
    SystemEvent = b'E',
}

/// Fixed-size feed record.
///
/// A flat struct with all payload fields; unused fields are zero. This
/// avoids tagged-union indirection in the hot path at the cost of a few
/// dead bytes per message.
#[derive(Clone, Copy, Debug)]
pub struct FeedMessage {
    // ── Header ──
    pub msg_type: FeedMessageType,
    pub sequence: SeqNum,
    pub timestamp_ns: Timestamp,
    pub symbol: Symbol,

    // ── Order payload ──
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub leaves_qty: Quantity,

    // ── Trade payload ──
    pub match_id: OrderId,
    pub aggressor: Side,

    // ── Snapshot / quote payload ──
    pub bid_price: Price,
    pub ask_price: Price,
    pub bid_size: Quantity,
    pub ask_size: Quantity,
}

// Wire records must stay within one 256-byte frame
const _: () = assert!(std::mem::size_of::<FeedMessage>() <= 256);

impl FeedMessage {
    fn blank(msg_type: FeedMessageType) -> Self {
        Self {
            msg_type,
            sequence: 0,
            timestamp_ns: 0,
            symbol: Symbol::default(),
            order_id: 0,
            side: Side::Buy,
            price: 0,
            quantity: 0,
            leaves_qty: 0,
            match_id: 0,
            aggressor: Side::Buy,
            bid_price: 0,
            ask_price: 0,
            bid_size: 0,
            ask_size: 0,
        }
    }

    pub fn add(order: &Order) -> Self {
        let mut msg = Self::blank(FeedMessageType::AddOrder);
        msg.timestamp_ns = order.entry_time;
        msg.symbol = order.symbol;
        msg.order_id = order.id;
        msg.side = order.side;
        msg.price = order.price;
        msg.quantity = order.leaves_qty;
        msg
    }

    pub fn replace(order: &Order) -> Self {
        let mut msg = Self::blank(FeedMessageType::ReplaceOrder);
        msg.timestamp_ns = order.last_update;
        msg.symbol = order.symbol;
        msg.order_id = order.id;
        msg.side = order.side;
        msg.price = order.price;
        msg.quantity = order.leaves_qty;
        msg
    }

    pub fn delete(order: &Order) -> Self {
        let mut msg = Self::blank(FeedMessageType::DeleteOrder);
        msg.timestamp_ns = order.last_update;
        msg.symbol = order.symbol;
        msg.order_id = order.id;
        msg.side = order.side;
        msg.price = order.price;
        msg
    }

    pub fn execute(order: &Order, filled: Quantity) -> Self {
        let mut msg = Self::blank(FeedMessageType::ExecuteOrder);
        msg.timestamp_ns = order.last_update;
        msg.symbol = order.symbol;
        msg.order_id = order.id;
        msg.side = order.side;
        msg.price = order.price;
        msg.quantity = filled;
        msg.leaves_qty = order.leaves_qty;
        msg
    }

    pub fn trade(trade: &Trade) -> Self {
        let mut msg = Self::blank(FeedMessageType::Trade);
        msg.timestamp_ns = trade.exec_time;
        msg.symbol = trade.symbol;
        msg.order_id = trade.buy_order_id;
        msg.match_id = trade.sell_order_id;
        msg.price = trade.price;
        msg.quantity = trade.quantity;
        msg.aggressor = trade.aggressor;
        msg
    }

    pub fn quote(symbol: Symbol, bid: (Price, Quantity), ask: (Price, Quantity)) -> Self {
        let mut msg = Self::blank(FeedMessageType::QuoteUpdate);
        msg.symbol = symbol;
        msg.bid_price = bid.0;
        msg.bid_size = bid.1;
        msg.ask_price = ask.0;
        msg.ask_size = ask.1;
        msg
    }
}

/// Per-type message counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub total_messages: u64,
    pub add_count: u64,
    pub execute_count: u64,
    pub trade_count: u64,
    pub delete_count: u64,
    pub replace_count: u64,
    pub snapshot_count: u64,
    pub quote_count: u64,
}

/// Publishes engine events as sequenced feed messages.
pub struct FeedPublisher {
    next_seq: SeqNum,
    messages: Vec<FeedMessage>,
    producer: Option<rtrb::Producer<FeedMessage>>,
    dropped: u64,
}

impl FeedPublisher {
    pub fn new() -> Self {
        Self {
            next_seq: 1,
            messages: Vec::new(),
            producer: None,
            dropped: 0,
        }
    }

    /// Publisher backed by a bounded SPSC ring; returns the consumer end.
    pub fn with_queue(capacity: usize) -> (Self, rtrb::Consumer<FeedMessage>) {
        let (producer, consumer) = rtrb::RingBuffer::new(capacity);
        let mut publisher = Self::new();
        publisher.producer = Some(producer);
        (publisher, consumer)
    }

    /// Wire a shared publisher into a book's callbacks.
    ///
    /// Trades publish a `T` record; order updates publish `A`/`U`/`D`
    /// according to the status transition. BBO quote records are emitted
    /// by the driver via [`publish_quote`](Self::publish_quote), since the
    /// book is not re-entrant from its own callbacks.
    pub fn attach(publisher: &Rc<RefCell<FeedPublisher>>, book: &mut OrderBook) {
        let on_trade = publisher.clone();
        book.set_trade_callback(Box::new(move |trade| {
            on_trade.borrow_mut().on_trade(trade);
        }));
        let on_order = publisher.clone();
        book.set_order_callback(Box::new(move |order| {
            on_order.borrow_mut().on_order(order);
        }));
    }

    pub fn on_trade(&mut self, trade: &Trade) {
        let _ = self.publish(FeedMessage::trade(trade));
    }

    pub fn on_order(&mut self, order: &Order) {
        let msg = match order.status {
            OrderStatus::New => FeedMessage::add(order),
            OrderStatus::Amended => FeedMessage::replace(order),
            OrderStatus::Cancelled | OrderStatus::Rejected => FeedMessage::delete(order),
            OrderStatus::Filled => FeedMessage::delete(order),
            OrderStatus::PartiallyFilled => FeedMessage::execute(order, order.filled_qty),
        };
        let _ = self.publish(msg);
    }

    /// Publish the current BBO of a book.
    pub fn publish_quote(&mut self, book: &OrderBook) -> Result<(), FeedError> {
        let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) else {
            return Ok(());
        };
        let bid_size = book.get_bids(1).first().map_or(0, |l| l.quantity);
        let ask_size = book.get_asks(1).first().map_or(0, |l| l.quantity);
        self.publish(FeedMessage::quote(
            book.symbol(),
            (bid, bid_size),
            (ask, ask_size),
        ))
    }

    /// Publish a top-of-book snapshot for client recovery.
    pub fn publish_snapshot(&mut self, book: &OrderBook) -> Result<(), FeedError> {
        let mut msg = FeedMessage::blank(FeedMessageType::Snapshot);
        msg.symbol = book.symbol();
        msg.bid_price = book.best_bid().unwrap_or(0);
        msg.ask_price = book.best_ask().unwrap_or(0);
        msg.bid_size = book.bid_depth(0);
        msg.ask_size = book.ask_depth(0);
        self.publish(msg)
    }

    /// Stamp the next sequence number and emit the message.
    ///
    /// The message is always recorded locally; a full ring drops the copy
    /// bound for the consumer and reports back-pressure.
    pub fn publish(&mut self, mut msg: FeedMessage) -> Result<(), FeedError> {
        msg.sequence = self.next_seq;
        self.next_seq += 1;
        self.messages.push(msg);

        if let Some(producer) = self.producer.as_mut() {
            if producer.push(msg).is_err() {
                self.dropped += 1;
                return Err(FeedError::QueueFull);
            }
        }
        Ok(())
    }

    #[inline]
    pub fn messages(&self) -> &[FeedMessage] {
        &self.messages
    }

    #[inline]
    pub fn sequence(&self) -> SeqNum {
        self.next_seq
    }

    /// Messages that could not be handed to the consumer.
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn stats(&self) -> FeedStats {
        let mut stats = FeedStats {
            total_messages: self.messages.len() as u64,
            ..FeedStats::default()
        };
        for msg in &self.messages {
            match msg.msg_type {
                FeedMessageType::AddOrder => stats.add_count += 1,
                FeedMessageType::ExecuteOrder => stats.execute_count += 1,
                FeedMessageType::Trade => stats.trade_count += 1,
                FeedMessageType::DeleteOrder => stats.delete_count += 1,
                FeedMessageType::ReplaceOrder => stats.replace_count += 1,
                FeedMessageType::Snapshot => stats.snapshot_count += 1,
                FeedMessageType::QuoteUpdate => stats.quote_count += 1,
                FeedMessageType::SystemEvent => {}
            }
        }
        stats
    }
}

impl Default for FeedPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer-side gap detection over contiguous sequence numbers.
#[derive(Debug)]
pub struct FeedGapDetector {
    next_expected: SeqNum,
}

impl FeedGapDetector {
    pub fn new() -> Self {
        Self { next_expected: 1 }
    }

    /// Feed each received sequence number in arrival order.
    pub fn observe(&mut self, sequence: SeqNum) -> Result<(), FeedError> {
        if sequence != self.next_expected {
            let expected = self.next_expected;
            self.next_expected = sequence + 1;
            return Err(FeedError::Gap {
                expected,
                got: sequence,
            });
        }
        self.next_expected += 1;
        Ok(())
    }
}

impl Default for FeedGapDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::NewOrderRequest;

    fn sym() -> Symbol {
        Symbol::new("TEST")
    }

    #[test]
    fn test_message_fits_wire_frame() {
        assert!(std::mem::size_of::<FeedMessage>() <= 256);
    }

    #[test]
    fn test_publisher_sequences_contiguous() {
        let mut publisher = FeedPublisher::new();
        let trade = Trade {
            sequence: 9,
            buy_order_id: 1,
            sell_order_id: 2,
            price: 10000,
            quantity: 100,
            exec_time: 0,
            aggressor: Side::Buy,
            symbol: sym(),
        };

        for _ in 0..5 {
            publisher.on_trade(&trade);
        }

        let seqs: Vec<SeqNum> = publisher.messages().iter().map(|m| m.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
        assert_eq!(publisher.sequence(), 6);
    }

    #[test]
    fn test_attach_publishes_book_events() {
        let mut book = OrderBook::new(sym());
        let publisher = Rc::new(RefCell::new(FeedPublisher::new()));
        FeedPublisher::attach(&publisher, &mut book);

        book.add_order(&NewOrderRequest::limit(1, Side::Sell, 10000, 100, sym()));
        book.add_order(&NewOrderRequest::limit(2, Side::Buy, 10000, 100, sym()));
        book.add_order(&NewOrderRequest::limit(3, Side::Buy, 9990, 50, sym()));
        book.cancel_order(3);

        let publisher = publisher.borrow();
        let stats = publisher.stats();
        // Resting add (id 1), trade + fill delete (id 1), add (id 3), delete (id 3)
        assert_eq!(stats.trade_count, 1);
        assert_eq!(stats.add_count, 2);
        assert_eq!(stats.delete_count, 2);

        // Contiguous stream end to end
        let mut detector = FeedGapDetector::new();
        for msg in publisher.messages() {
            detector.observe(msg.sequence).unwrap();
        }
    }

    #[test]
    fn test_gap_detector_flags_skip() {
        let mut detector = FeedGapDetector::new();
        assert!(detector.observe(1).is_ok());
        assert!(detector.observe(2).is_ok());
        assert_eq!(
            detector.observe(5),
            Err(FeedError::Gap {
                expected: 3,
                got: 5
            })
        );
        // Resynchronized after the gap
        assert!(detector.observe(6).is_ok());
    }

    #[test]
    fn test_queue_full_backpressure() {
        let (mut publisher, mut consumer) = FeedPublisher::with_queue(2);
        let msg = FeedMessage::blank(FeedMessageType::SystemEvent);

        assert!(publisher.publish(msg).is_ok());
        assert!(publisher.publish(msg).is_ok());
        assert_eq!(publisher.publish(msg), Err(FeedError::QueueFull));
        assert_eq!(publisher.dropped(), 1);

        // Consumer drains, capacity frees up
        assert_eq!(consumer.pop().unwrap().sequence, 1);
        assert!(publisher.publish(msg).is_ok());
    }

    #[test]
    fn test_quote_and_snapshot() {
        let mut book = OrderBook::new(sym());
        book.add_order(&NewOrderRequest::limit(1, Side::Buy, 9990, 100, sym()));
        book.add_order(&NewOrderRequest::limit(2, Side::Sell, 10010, 200, sym()));

        let mut publisher = FeedPublisher::new();
        publisher.publish_quote(&book).unwrap();
        publisher.publish_snapshot(&book).unwrap();

        let messages = publisher.messages();
        assert_eq!(messages[0].msg_type, FeedMessageType::QuoteUpdate);
        assert_eq!(messages[0].bid_price, 9990);
        assert_eq!(messages[0].ask_price, 10010);
        assert_eq!(messages[0].bid_size, 100);
        assert_eq!(messages[0].ask_size, 200);

        assert_eq!(messages[1].msg_type, FeedMessageType::Snapshot);
        assert_eq!(messages[1].bid_size, 100);
    }
}
