//! Property tests over random request streams.
//!
//! Every mutating operation is followed by the full invariant battery:
//! no crossed book, FIFO within levels, level accounting, quantity
//! conservation, no phantom fills from cancelled orders, and strictly
//! increasing sequence numbers.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use micro_lob::{
    AmendRequest, CancelRequest, Engine, NewOrderRequest, Order, OrderId, Side, Symbol, Trade,
};

fn sym() -> Symbol {
    Symbol::new("TEST")
}

fn random_place(rng: &mut ChaCha8Rng, id: OrderId) -> NewOrderRequest {
    let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
    let price = rng.gen_range(9900..10101);
    let quantity = rng.gen_range(1..11) * 100;

    let roll: f64 = rng.gen();
    if roll < 0.65 {
        NewOrderRequest::limit(id, side, price, quantity, sym())
    } else if roll < 0.80 {
        NewOrderRequest::market(id, side, quantity, sym())
    } else if roll < 0.90 {
        NewOrderRequest::ioc(id, side, price, quantity, sym())
    } else {
        NewOrderRequest::fok(id, side, price, quantity, sym())
    }
}

struct Harness {
    engine: Engine,
    trades: Rc<RefCell<Vec<Trade>>>,
    /// Latest observed filled_qty per order id
    filled: Rc<RefCell<HashMap<OrderId, u64>>>,
    cancelled: HashSet<OrderId>,
    active: Vec<OrderId>,
}

impl Harness {
    fn new() -> Self {
        let mut engine = Engine::new();
        engine.add_symbol(sym());

        let trades = Rc::new(RefCell::new(Vec::new()));
        let sink = trades.clone();
        engine.set_trade_callback(move |t: &Trade| sink.borrow_mut().push(*t));

        let filled: Rc<RefCell<HashMap<OrderId, u64>>> = Rc::new(RefCell::new(HashMap::new()));
        let fills = filled.clone();
        engine
            .get_book_mut(sym())
            .unwrap()
            .set_order_callback(Box::new(move |o: &Order| {
                fills.borrow_mut().insert(o.id, o.filled_qty);
            }));

        Self {
            engine,
            trades,
            filled,
            cancelled: HashSet::new(),
            active: Vec::new(),
        }
    }

    fn check_invariants(&self) {
        let book = self.engine.get_book(sym()).unwrap();
        assert!(book.check_no_crossed_book(), "crossed book");
        assert!(book.check_fifo(), "FIFO violated");
        assert!(book.check_level_accounting(), "level accounting drifted");

        // Conservation: every trade removes the same quantity from both
        // sides, so total filled across all orders is twice total traded
        let traded: u64 = self.trades.borrow().iter().map(|t| t.quantity).sum();
        let filled: u64 = self.filled.borrow().values().sum();
        assert_eq!(filled, 2 * traded, "conservation violated");
    }

    fn check_no_phantom_fills(&self) {
        // A cancelled order must never appear in a trade after its cancel
        let trades = self.trades.borrow();
        let recent = trades.last();
        if let Some(trade) = recent {
            assert!(
                !self.cancelled.contains(&trade.buy_order_id)
                    && !self.cancelled.contains(&trade.sell_order_id),
                "cancelled order traded"
            );
        }
    }
}

#[test]
fn invariants_hold_through_random_stream() {
    const SEED: u64 = 0xFEED_FACE;
    const OPS: usize = 10_000;

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let mut harness = Harness::new();
    let mut next_id: OrderId = 1;

    for _ in 0..OPS {
        let roll: f64 = rng.gen();

        if harness.active.is_empty() || roll < 0.55 {
            let req = random_place(&mut rng, next_id);
            let order = harness.engine.submit_order(&req).unwrap();
            harness
                .filled
                .borrow_mut()
                .entry(order.id)
                .and_modify(|f| *f = order.filled_qty)
                .or_insert(order.filled_qty);
            next_id += 1;

            if harness.engine.get_book(sym()).unwrap().order(order.id).is_some() {
                harness.active.push(order.id);
            }
        } else if roll < 0.80 {
            let idx = rng.gen_range(0..harness.active.len());
            let id = harness.active.swap_remove(idx);
            if harness.engine.cancel_order(&CancelRequest {
                order_id: id,
                symbol: sym(),
            }) {
                harness.cancelled.insert(id);
            }
        } else {
            let idx = rng.gen_range(0..harness.active.len());
            let id = harness.active[idx];
            let req = AmendRequest {
                order_id: id,
                new_price: if rng.gen_bool(0.5) {
                    rng.gen_range(9900..10101)
                } else {
                    0
                },
                new_quantity: if rng.gen_bool(0.7) {
                    rng.gen_range(1..11) * 100
                } else {
                    0
                },
                symbol: sym(),
            };
            let priority_losing = {
                let book = harness.engine.get_book(sym()).unwrap();
                book.order(id).is_some_and(|o| {
                    (req.new_price != 0 && req.new_price != o.price)
                        || (req.new_quantity != 0 && req.new_quantity > o.leaves_qty)
                })
            };
            if harness.engine.amend_order(&req) {
                let book = harness.engine.get_book(sym()).unwrap();
                match book.order(id) {
                    Some(order) => {
                        // A priority-losing amend lands at the tail of its
                        // (possibly new) queue with the greatest sequence
                        if priority_losing && order.leaves_qty > 0 {
                            let queue = book.level_orders(order.side, order.price);
                            assert_eq!(queue.last().unwrap().id, id, "amend not at tail");
                        }
                    }
                    None => {
                        // Filled during re-match
                        harness.active.swap_remove(idx);
                    }
                }
            } else {
                harness.active.swap_remove(idx);
            }
        }

        harness.check_invariants();
        harness.check_no_phantom_fills();
    }

    // Sequence numbers strictly increase across the whole run
    let trades = harness.trades.borrow();
    for pair in trades.windows(2) {
        assert!(pair[0].sequence < pair[1].sequence, "sequence not monotonic");
    }
    assert!(!trades.is_empty());
}

#[test]
fn filled_plus_leaves_bounded_by_quantity() {
    const SEED: u64 = 0xBAD_C0DE;
    const OPS: usize = 5_000;

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let mut engine = Engine::new();
    engine.add_symbol(sym());

    for id in 1..=OPS as u64 {
        let req = random_place(&mut rng, id);
        let order = engine.submit_order(&req).unwrap();

        // The returned snapshot is either active with exact accounting or
        // terminal with zero leaves
        if order.is_active() {
            assert_eq!(order.filled_qty + order.leaves_qty, order.quantity);
        } else {
            assert!(order.filled_qty + order.leaves_qty <= order.quantity);
            assert_eq!(order.leaves_qty, 0);
        }

        // And the same holds for everything resting in the book
        let book = engine.get_book(sym()).unwrap();
        for (rid, _) in book.resting_orders() {
            let resting = book.order(rid).unwrap();
            assert_eq!(
                resting.filled_qty + resting.leaves_qty,
                resting.quantity,
                "resting order accounting broken"
            );
        }
    }
}

#[test]
fn fok_never_partially_fills() {
    const SEED: u64 = 0x5EED;
    const OPS: usize = 4_000;

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let mut engine = Engine::new();
    engine.add_symbol(sym());

    let mut fok_count = 0;
    for id in 1..=OPS as u64 {
        let mut req = random_place(&mut rng, id);
        if id % 5 == 0 {
            req = NewOrderRequest::fok(
                id,
                req.side,
                rng.gen_range(9900..10101),
                rng.gen_range(1..20) * 100,
                sym(),
            );
            fok_count += 1;
        }
        let order = engine.submit_order(&req).unwrap();

        if req.id % 5 == 0 {
            assert!(
                order.filled_qty == 0 || order.filled_qty == order.quantity,
                "FOK partially filled: {} of {}",
                order.filled_qty,
                order.quantity
            );
        }
    }
    assert!(fok_count > 0);
}
