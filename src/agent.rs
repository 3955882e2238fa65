//! Zero-intelligence agent with strategic cancellations.
//!
//! Pure ZI flow (uniform placement, no cancels) produces spreads that are
//! too wide and returns that are too thin-tailed. This variant places
//! limit prices normally around the midpoint, draws log-normal sizes
//! rounded to 100-share lots, and cancels resting orders with a
//! probability that grows with distance from the mid. Combined with the
//! Hawkes arrival process this reproduces the empirical stylized facts.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, LogNormal, Normal};

use crate::order::{NewOrderRequest, Order, OrderId, OrderType, Price, Quantity, Side, Symbol,
    TimeInForce, PRICE_MARKET};

/// Agent behaviour parameters.
#[derive(Clone, Copy, Debug)]
pub struct AgentParams {
    /// Std-dev of limit placement around the mid (ticks)
    pub sigma_price: f64,
    /// Probability an order is a market order
    pub market_order_prob: f64,
    /// Mean order size (shares)
    pub mean_size: f64,
    /// Log-normal shape of order size
    pub sigma_size: f64,
    /// Baseline per-evaluation cancel probability
    pub cancel_base_prob: f64,
    /// Extra cancel probability per tick of distance from the mid
    pub cancel_distance_mult: f64,
    pub agent_id: u64,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            sigma_price: 5.0,
            market_order_prob: 0.15,
            mean_size: 100.0,
            sigma_size: 0.8,
            cancel_base_prob: 0.02,
            cancel_distance_mult: 0.005,
            agent_id: 0,
        }
    }
}

/// Per-agent order generator with its own seeded PRNG (never shared).
pub struct ZiAgent {
    params: AgentParams,
    rng: ChaCha8Rng,
    price_offset: Normal<f64>,
    size: LogNormal<f64>,
}

impl ZiAgent {
    /// # Panics
    /// Panics if `sigma_price` or `sigma_size` is negative or non-finite.
    pub fn new(params: AgentParams, seed: u64) -> Self {
        let price_offset =
            Normal::new(0.0, params.sigma_price).expect("sigma_price must be finite and >= 0");
        let size = LogNormal::new(params.mean_size.ln(), params.sigma_size)
            .expect("sigma_size must be finite and >= 0");
        Self {
            params,
            rng: ChaCha8Rng::seed_from_u64(seed),
            price_offset,
            size,
        }
    }

    #[inline]
    pub fn params(&self) -> &AgentParams {
        &self.params
    }

    /// Construct the next order given the current market state.
    ///
    /// With probability `market_order_prob` the order is a market/IOC;
    /// otherwise a GTC limit priced `|N(0, sigma_price)|` ticks inside of
    /// the mid on the order's own side, clamped to at least one tick.
    pub fn generate_order(
        &mut self,
        mid_price: Price,
        _spread: Price,
        is_buy: bool,
        id: OrderId,
        symbol: Symbol,
    ) -> NewOrderRequest {
        let side = if is_buy { Side::Buy } else { Side::Sell };

        let (order_type, tif, price) = if self.rng.gen::<f64>() < self.params.market_order_prob {
            (OrderType::Market, TimeInForce::IOC, PRICE_MARKET)
        } else {
            let offset = self.price_offset.sample(&mut self.rng).abs() as Price;
            let price = if is_buy {
                mid_price - offset
            } else {
                mid_price + offset
            };
            (OrderType::Limit, TimeInForce::GTC, price.max(1))
        };

        NewOrderRequest {
            id,
            side,
            order_type,
            tif,
            price,
            quantity: self.draw_size(),
            symbol,
        }
    }

    /// Log-normal size, rounded to the nearest 100-share lot, minimum 100.
    fn draw_size(&mut self) -> Quantity {
        let raw = self.size.sample(&mut self.rng);
        let qty = (raw.round().max(1.0)) as Quantity;
        let lots = (qty + 50) / 100 * 100;
        if lots == 0 {
            100
        } else {
            lots
        }
    }

    /// Cancel decision for one resting order: probability rises linearly
    /// with the order's distance from the current mid.
    pub fn should_cancel(&mut self, order: &Order, mid_price: Price) -> bool {
        if !order.is_active() {
            return false;
        }
        let distance = (order.price - mid_price).abs();
        let cancel_prob =
            self.params.cancel_base_prob + self.params.cancel_distance_mult * distance as f64;
        self.rng.gen::<f64>() < cancel_prob
    }

    /// Batch cancel decisions over `(id, price)` pairs; returns the ids to
    /// cancel. Each decision is independent.
    pub fn evaluate_cancels(
        &mut self,
        resting_orders: &[(OrderId, Price)],
        mid_price: Price,
    ) -> Vec<OrderId> {
        let mut to_cancel = Vec::new();
        for &(id, price) in resting_orders {
            let distance = (price - mid_price).abs();
            let cancel_prob =
                self.params.cancel_base_prob + self.params.cancel_distance_mult * distance as f64;
            if self.rng.gen::<f64>() < cancel_prob {
                to_cancel.push(id);
            }
        }
        to_cancel
    }
}
