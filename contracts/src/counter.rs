//! # Counter Contract
//!
//! A minimal call target for exercising delegated execution: wallets submit
//! an encoded [`Call::Add`](crate::payload::Call::Add) and the counter goes up.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the counter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterError {
    /// The addition would overflow.
    #[error("counter overflow: {current} + {amount}")]
    Overflow {
        /// Value before the call.
        current: u64,
        /// Requested increment.
        amount: u64,
    },
}

/// Running total incremented by [`Counter::add`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    num: u64,
}

impl Counter {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value.
    pub fn num(&self) -> u64 {
        self.num
    }

    /// Adds `amount`.
    pub fn add(&mut self, amount: u64) -> Result<u64, CounterError> {
        self.num = self.num.checked_add(amount).ok_or(CounterError::Overflow {
            current: self.num,
            amount,
        })?;
        Ok(self.num)
    }
}
