//! Single-flight coordination: at most one live fetch per cache key; every
//! concurrent caller for that key observes the same outcome.
//!
//! Subscription happens under the map lock and completion sends under the
//! same lock, so a waiter can never subscribe after the outcome was
//! published and miss it.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::model::CacheKey;

pub enum Flight<T> {
    /// This caller starts the fetch; the receiver observes its outcome.
    Leader { rx: broadcast::Receiver<T> },
    /// A fetch is already running; await its outcome.
    Waiter(broadcast::Receiver<T>),
}

pub struct FlightMap<T: Clone> {
    inner: Mutex<HashMap<CacheKey, broadcast::Sender<T>>>,
}

impl<T: Clone> Default for FlightMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> FlightMap<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Join the in-flight fetch for `key` as a waiter, or become its leader.
    pub fn join_or_lead(&self, key: &CacheKey) -> Flight<T> {
        let mut map = self.inner.lock().expect("flight map mutex poisoned");
        if let Some(tx) = map.get(key) {
            metrics::counter!("acquire_singleflight_joins_total").increment(1);
            return Flight::Waiter(tx.subscribe());
        }
        let (tx, rx) = broadcast::channel(1);
        map.insert(key.clone(), tx);
        Flight::Leader { rx }
    }

    /// Publish the outcome to every waiter and retire the flight.
    pub fn complete(&self, key: &CacheKey, outcome: T) {
        let mut map = self.inner.lock().expect("flight map mutex poisoned");
        if let Some(tx) = map.remove(key) {
            // Zero receivers is fine: every caller may have timed out.
            let _ = tx.send(outcome);
        }
    }

    #[cfg(test)]
    pub fn live(&self) -> usize {
        self.inner.lock().expect("flight map mutex poisoned").len()
    }
}
