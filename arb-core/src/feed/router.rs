//! `OrderRouter` (§6): the synchronous `sendOrder` boundary, with a
//! deterministic in-memory simulator grounded in the reference
//! deployment's own simulated-execution mode.

use crate::core::errors::EngineError;
use crate::core::types::{OrderId, OrderType, Side};
use crate::engine::strategy::StrategyId;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub strategy_id: StrategyId,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: u64,
    pub order_type: OrderType,
}

#[derive(Debug, Clone)]
pub struct OrderResponse {
    pub order_id: OrderId,
    pub error_code: Option<String>,
}

/// Synchronous `sendOrder(ctx, OrderRequest) -> OrderResponse` boundary
/// (§6). Implementations must respect `timeout` and must never mutate
/// caller-visible position state themselves — a confirmed fill always
/// arrives later on the `order.>` fan-in, never as a side effect of this
/// call (§5 cancellation/timeouts rule).
pub trait OrderRouter: Send + Sync {
    fn send(&self, req: OrderRequest, timeout: Duration) -> Result<OrderResponse, EngineError>;
}

/// Deterministic in-memory router for tests and demo binaries: always
/// accepts within `latency`, unless `reject_next` has been armed. Does
/// not itself deliver fills; callers of test scenarios push `OrderUpdate`s
/// through the strategy's `on_order_update` directly.
pub struct InMemoryOrderRouter {
    latency: Duration,
    reject_next: Mutex<bool>,
    accepted: Mutex<HashMap<OrderId, OrderRequest>>,
}

impl InMemoryOrderRouter {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            reject_next: Mutex::new(false),
            accepted: Mutex::new(HashMap::new()),
        }
    }

    /// Arm a single rejected response on the next `send` call — test
    /// hook for exercising `TransportError`/reject-limit paths.
    pub fn arm_reject(&self) {
        *self.reject_next.lock().unwrap() = true;
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.lock().unwrap().len()
    }
}

impl OrderRouter for InMemoryOrderRouter {
    fn send(&self, req: OrderRequest, timeout: Duration) -> Result<OrderResponse, EngineError> {
        if timeout < self.latency {
            warn!(
                strategy_id = %req.strategy_id,
                symbol = %req.symbol,
                "order router: simulated latency exceeds deadline"
            );
            return Err(EngineError::transport("in-memory-router", "deadline exceeded"));
        }

        let mut reject_next = self.reject_next.lock().unwrap();
        if *reject_next {
            *reject_next = false;
            return Ok(OrderResponse {
                order_id: OrderId::generate(),
                error_code: Some("REJECTED".to_string()),
            });
        }
        drop(reject_next);

        let order_id = OrderId::generate();
        debug!(strategy_id = %req.strategy_id, symbol = %req.symbol, side = %req.side, price = %req.price, qty = req.quantity, "order router: accepted");
        self.accepted.lock().unwrap().insert(order_id, req);
        Ok(OrderResponse {
            order_id,
            error_code: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> OrderRequest {
        OrderRequest {
            strategy_id: StrategyId(1),
            symbol: "IF2412".to_string(),
            side: Side::Buy,
            price: dec!(100.0),
            quantity: 10,
            order_type: OrderType::Limit,
        }
    }

    #[test]
    fn accepts_orders_by_default() {
        let router = InMemoryOrderRouter::new(Duration::from_millis(1));
        let resp = router.send(request(), Duration::from_millis(50)).unwrap();
        assert!(resp.error_code.is_none());
        assert_eq!(router.accepted_count(), 1);
    }

    #[test]
    fn armed_reject_fires_once() {
        let router = InMemoryOrderRouter::new(Duration::from_millis(1));
        router.arm_reject();
        let resp = router.send(request(), Duration::from_millis(50)).unwrap();
        assert_eq!(resp.error_code.as_deref(), Some("REJECTED"));

        let resp2 = router.send(request(), Duration::from_millis(50)).unwrap();
        assert!(resp2.error_code.is_none());
    }

    #[test]
    fn deadline_shorter_than_latency_errors_without_mutating_state() {
        let router = InMemoryOrderRouter::new(Duration::from_millis(100));
        let err = router.send(request(), Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, EngineError::Transport { .. }));
        assert_eq!(router.accepted_count(), 0);
    }
}
