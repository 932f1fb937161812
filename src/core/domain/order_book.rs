//! Per-token incremental L2 order book and per-market composition.
//!
//! Grounded on the price-level bookkeeping of `OrderBook-rs` (sorted maps
//! keyed by price, O(1) best-price reads, zero-size levels deleted) but
//! single-threaded: the book is owned by the market data service and
//! published as immutable snapshots (see [`crate::core::bus`]), so there
//! is no need for the lock-free skiplist machinery the library uses for
//! concurrent in-place mutation.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::TokenId;
use super::money::{Price, Size};

/// One level of an order book: a price and the aggregate size resting there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: Price,
    pub size: Size,
}

impl OrderBookLevel {
    #[must_use]
    pub const fn new(price: Price, size: Size) -> Self {
        Self { price, size }
    }
}

/// Ascending-price wrapper so asks sort naturally in a `BTreeMap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Ascending(Decimal);

/// Descending-price wrapper so bids sort best-first in a `BTreeMap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Descending(Decimal);

impl PartialOrd for Descending {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Descending {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.0.cmp(&self.0)
    }
}

/// One token's incremental L2 book.
///
/// `bids` sorts best-first (descending price), `asks` sorts best-first
/// (ascending price). Every mutation bumps `revision`; readers that
/// capture `revision` before and after a batch of reads can detect a
/// concurrent update without locking the whole book.
#[derive(Debug, Clone)]
pub struct InMemoryOrderBook {
    token_id: TokenId,
    bids: BTreeMap<Descending, Size>,
    asks: BTreeMap<Ascending, Size>,
    revision: u64,
}

impl InMemoryOrderBook {
    #[must_use]
    pub fn new(token_id: TokenId) -> Self {
        Self {
            token_id,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            revision: 0,
        }
    }

    #[must_use]
    pub fn token_id(&self) -> &TokenId {
        &self.token_id
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Upsert a bid level; `size == 0` deletes it. No-op if the price
    /// isn't present and size is already zero.
    pub fn update_bid(&mut self, price: Price, size: Size) {
        Self::upsert(&mut self.bids, Descending(price), size, &mut self.revision);
    }

    /// Upsert an ask level; `size == 0` deletes it.
    pub fn update_ask(&mut self, price: Price, size: Size) {
        Self::upsert(&mut self.asks, Ascending(price), size, &mut self.revision);
    }

    fn upsert<K: Ord>(side: &mut BTreeMap<K, Size>, key: K, size: Size, revision: &mut u64) {
        if size <= Decimal::ZERO {
            if side.remove(&key).is_some() {
                *revision += 1;
            }
            return;
        }
        side.insert(key, size);
        *revision += 1;
    }

    /// Atomically replace both sides of the book. Observers only ever
    /// see the book before or after this call, never a partial state,
    /// because both maps are rebuilt before `self` is mutated.
    pub fn apply_snapshot(&mut self, bids: &[OrderBookLevel], asks: &[OrderBookLevel]) {
        let new_bids: BTreeMap<Descending, Size> = bids
            .iter()
            .filter(|l| l.size > Decimal::ZERO)
            .map(|l| (Descending(l.price), l.size))
            .collect();
        let new_asks: BTreeMap<Ascending, Size> = asks
            .iter()
            .filter(|l| l.size > Decimal::ZERO)
            .map(|l| (Ascending(l.price), l.size))
            .collect();
        self.bids = new_bids;
        self.asks = new_asks;
        self.revision += 1;
    }

    #[must_use]
    pub fn best_bid(&self) -> Option<OrderBookLevel> {
        self.bids
            .iter()
            .next()
            .map(|(k, v)| OrderBookLevel::new(k.0, *v))
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<OrderBookLevel> {
        self.asks
            .iter()
            .next()
            .map(|(k, v)| OrderBookLevel::new(k.0, *v))
    }

    #[must_use]
    pub fn bid_depth(&self, n: usize) -> Vec<OrderBookLevel> {
        self.bids
            .iter()
            .take(n)
            .map(|(k, v)| OrderBookLevel::new(k.0, *v))
            .collect()
    }

    #[must_use]
    pub fn ask_depth(&self, n: usize) -> Vec<OrderBookLevel> {
        self.asks
            .iter()
            .take(n)
            .map(|(k, v)| OrderBookLevel::new(k.0, *v))
            .collect()
    }

    #[must_use]
    pub fn total_bid_size(&self, n: usize) -> Size {
        self.bid_depth(n).iter().map(|l| l.size).sum()
    }

    #[must_use]
    pub fn total_ask_size(&self, n: usize) -> Size {
        self.ask_depth(n).iter().map(|l| l.size).sum()
    }

    /// Property-checking helper: every level has positive size, and both
    /// sides are sorted by construction. The sort invariant is structural
    /// here, so this only re-checks positivity.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let sizes_positive = self
            .bids
            .values()
            .chain(self.asks.values())
            .all(|s| *s > Decimal::ZERO);
        let crossed = match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => b.price > a.price,
            _ => false,
        };
        sizes_positive && !crossed
    }
}

/// Derived view over a market's YES and NO books.
///
/// Owns snapshots rather than borrowing so it can be handed across the
/// event bus without entangling callers with the order book store's
/// internal locking: readers access shared state through
/// snapshot-returning methods.
#[derive(Debug, Clone)]
pub struct MarketOrderBook {
    pub market_id: super::id::MarketId,
    pub yes_book: InMemoryOrderBook,
    pub no_book: InMemoryOrderBook,
}

impl MarketOrderBook {
    #[must_use]
    pub fn new(market_id: super::id::MarketId, yes_book: InMemoryOrderBook, no_book: InMemoryOrderBook) -> Self {
        Self {
            market_id,
            yes_book,
            no_book,
        }
    }

    #[must_use]
    pub fn combined_ask(&self) -> Option<Price> {
        Some(self.yes_book.best_ask()?.price + self.no_book.best_ask()?.price)
    }

    #[must_use]
    pub fn arbitrage_spread(&self) -> Option<Decimal> {
        self.combined_ask().map(|ca| Decimal::ONE - ca)
    }

    #[must_use]
    pub fn has_arbitrage(&self) -> bool {
        self.arbitrage_spread().is_some_and(|s| s > Decimal::ZERO)
    }
}
