//! The read-only view of chain state the pool needs to validate admission: a
//! sender's current nonce and spendable balance. The pool never mutates chain state
//! and never blocks on it — implementors are expected to serve these from an
//! in-memory snapshot of the latest block, refreshed by the caller via
//! [`crate::pool::TxPool::reset`].

use alloy_primitives::{Address, U256};

/// Chain-state lookups required for admission.
pub trait StateReader: Send + Sync {
    /// The next valid nonce for `address` (i.e. the count of mined transactions).
    fn nonce(&self, address: Address) -> u64;

    /// The spendable balance of `address` at the current block.
    fn balance(&self, address: Address) -> U256;
}

/// An in-memory [`StateReader`] for tests: a fixed table of nonces and balances.
/// Addresses it hasn't been told about default to nonce `0` and an effectively
/// unconstrained balance, so tests that aren't specifically exercising the
/// affordability check don't need to set one up just to get past it; tests that
/// do care about `insufficient_funds` call [`Self::set_balance`] explicitly.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone)]
pub struct MockStateReader {
    nonces: std::collections::HashMap<Address, u64>,
    balances: std::collections::HashMap<Address, U256>
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for MockStateReader {
    fn default() -> Self {
        Self { nonces: std::collections::HashMap::new(), balances: std::collections::HashMap::new() }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl MockStateReader {
    /// An empty reader: every address has nonce 0 and an unconstrained balance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the nonce recorded for `address`.
    pub fn set_nonce(&mut self, address: Address, nonce: u64) -> &mut Self {
        self.nonces.insert(address, nonce);
        self
    }

    /// Sets the balance recorded for `address`.
    pub fn set_balance(&mut self, address: Address, balance: U256) -> &mut Self {
        self.balances.insert(address, balance);
        self
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl StateReader for MockStateReader {
    fn nonce(&self, address: Address) -> u64 {
        self.nonces.get(&address).copied().unwrap_or(0)
    }

    fn balance(&self, address: Address) -> U256 {
        self.balances.get(&address).copied().unwrap_or(U256::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_address_defaults_to_unconstrained_balance_and_zero_nonce() {
        let state = MockStateReader::new();
        let addr = Address::repeat_byte(1);
        assert_eq!(state.nonce(addr), 0);
        assert_eq!(state.balance(addr), U256::MAX);
    }

    #[test]
    fn set_balance_overrides_the_default() {
        let mut state = MockStateReader::new();
        let addr = Address::repeat_byte(1);
        state.set_balance(addr, U256::from(100u64));
        assert_eq!(state.balance(addr), U256::from(100u64));
    }
}
