//! `MarketDataSource` (§6 `md.<exchange>.<symbol>`): a blocking receive
//! boundary the engine polls on its own worker, with an in-memory
//! channel-backed implementation for tests and demo binaries.

use crate::domain::signal::MarketTick;
use crossbeam::channel::{Receiver, Sender, TryRecvError};

/// Receives `MarketTick`s published on the wildcard `md.*.<symbol>`
/// subscription. Implementations must never block the caller past the
/// transport's own send-side backpressure (§5: indicator updates and
/// state-machine transitions must not block on I/O).
pub trait MarketDataSource: Send {
    /// Non-blocking poll: `None` means no tick is currently available.
    fn try_recv(&self) -> Option<MarketTick>;

    /// Blocking receive with a timeout; `None` on timeout or source
    /// closed.
    fn recv_timeout(&self, timeout: std::time::Duration) -> Option<MarketTick>;
}

/// Bounded channel-backed test double. The publish side (`sender()`) is
/// handed to test setup code or a feed-simulation binary; the engine only
/// ever sees the receive half.
pub struct ChannelMarketDataSource {
    tx: Sender<MarketTick>,
    rx: Receiver<MarketTick>,
}

impl ChannelMarketDataSource {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam::channel::bounded(capacity);
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<MarketTick> {
        self.tx.clone()
    }
}

impl MarketDataSource for ChannelMarketDataSource {
    fn try_recv(&self) -> Option<MarketTick> {
        match self.rx.try_recv() {
            Ok(tick) => Some(tick),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn recv_timeout(&self, timeout: std::time::Duration) -> Option<MarketTick> {
        self.rx.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::FeedType;
    use rust_decimal::Decimal;
    use std::time::Duration;

    fn tick(symbol: &str) -> MarketTick {
        MarketTick {
            symbol: symbol.to_string(),
            exchange: "CFFEX".to_string(),
            timestamp_ns: 0,
            bid_prices: vec![],
            bid_qty: vec![],
            ask_prices: vec![],
            ask_qty: vec![],
            last_price: Decimal::ZERO,
            total_volume: 0,
            turnover: Decimal::ZERO,
            feed_type: FeedType::Continuous,
        }
    }

    #[test]
    fn try_recv_returns_none_on_empty_channel() {
        let source = ChannelMarketDataSource::new(4);
        assert!(source.try_recv().is_none());
    }

    #[test]
    fn published_tick_is_received() {
        let source = ChannelMarketDataSource::new(4);
        source.sender().send(tick("IF2412")).unwrap();
        let received = source.try_recv().unwrap();
        assert_eq!(received.symbol, "IF2412");
    }

    #[test]
    fn recv_timeout_returns_none_when_nothing_published() {
        let source = ChannelMarketDataSource::new(4);
        assert!(source.recv_timeout(Duration::from_millis(5)).is_none());
    }
}
