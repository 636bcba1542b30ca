//! Registry of in-flight computations keyed by cache key.
//!
//! The first caller for a key becomes the leader and runs the work; callers
//! arriving while it runs block until the leader publishes its result and
//! then share it.

use crate::error::AppError;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;

struct Flight<T> {
    result: Mutex<Option<Result<T, AppError>>>,
    done: Condvar,
}

impl<T> Flight<T> {
    fn new() -> Self {
        Flight {
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }
}

pub struct Coalescer<T> {
    inflight: Mutex<HashMap<String, Arc<Flight<T>>>>,
}

impl<T> Default for Coalescer<T> {
    fn default() -> Self {
        Coalescer {
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

/// Publishes a result and unregisters the flight, even if the leader's work panics.
struct LeaderGuard<'a, T: Clone> {
    registry: &'a Coalescer<T>,
    key: &'a str,
    flight: Arc<Flight<T>>,
}

impl<T: Clone> LeaderGuard<'_, T> {
    fn publish(&self, outcome: &Result<T, AppError>) {
        *self.flight.result.lock() = Some(outcome.clone());
    }
}

impl<T: Clone> Drop for LeaderGuard<'_, T> {
    fn drop(&mut self) {
        {
            let mut slot = self.flight.result.lock();
            if slot.is_none() {
                *slot = Some(Err(AppError::UpstreamUnavailable(format!(
                    "computation for {} was abandoned",
                    self.key
                ))));
            }
        }
        self.registry.inflight.lock().remove(self.key);
        self.flight.done.notify_all();
    }
}

impl<T: Clone> Coalescer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }

    pub fn run<F>(&self, key: &str, work: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Result<T, AppError>,
    {
        let (flight, leader) = {
            let mut inflight = self.inflight.lock();
            match inflight.get(key) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(Flight::new());
                    inflight.insert(key.to_string(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if leader {
            let guard = LeaderGuard {
                registry: self,
                key,
                flight,
            };
            let outcome = work();
            guard.publish(&outcome);
            return outcome;
        }

        tracing::debug!(key, "joining in-flight computation");
        let mut slot = flight.result.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            flight.done.wait(&mut slot);
        }
    }
}
