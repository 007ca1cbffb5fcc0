//! Administration operations, gated by the configured owner.

use custodex_store::keys;
use custodex_types::{Address, Amount, ContractState, CustodexError, HostLedger, Result};

use crate::engine::Broker;

impl Broker {
    /// Activate a pending contract: set both fee rates and the fee
    /// address, move to `Active`, and seed the current bucket's staked
    /// total to zero so later buckets have a value to inherit.
    ///
    /// # Errors
    ///
    /// `NotOwner` without owner authorization, `AlreadyInitialized` if
    /// the contract left `Pending` before, `InvalidFeeConfig` for rates
    /// above the maximum.
    pub fn initialize(
        &mut self,
        host: &impl HostLedger,
        taker_fee: Amount,
        maker_fee: Amount,
        fee_address: Address,
    ) -> Result<()> {
        self.require_owner(host)?;
        if self.get_state() != ContractState::Pending {
            return Err(CustodexError::AlreadyInitialized);
        }
        self.store_fees(taker_fee, maker_fee)?;
        self.kv
            .put(keys::fee_address_key(), fee_address.as_bytes().to_vec());
        self.kv.put(keys::state_key(), ContractState::Active.encode());
        self.kv
            .put_amount(keys::staked_total_key(self.current_bucket(host)), 0);

        tracing::info!(taker_fee, maker_fee, %fee_address, "contract initialized");
        Ok(())
    }

    /// Halt trading. Cancels and withdrawals keep working.
    ///
    /// # Errors
    ///
    /// `NotOwner` without owner authorization; `WrongState` unless the
    /// contract is currently `Active`.
    pub fn freeze_trading(&mut self, host: &impl HostLedger) -> Result<()> {
        self.require_owner(host)?;
        self.require_active()?;
        self.kv.put(keys::state_key(), ContractState::Frozen.encode());
        tracing::info!("trading frozen");
        Ok(())
    }

    /// Resume trading after a freeze.
    ///
    /// # Errors
    ///
    /// `NotOwner` without owner authorization; `WrongState` unless the
    /// contract is currently `Frozen`.
    pub fn unfreeze_trading(&mut self, host: &impl HostLedger) -> Result<()> {
        self.require_owner(host)?;
        let state = self.get_state();
        if state != ContractState::Frozen {
            return Err(CustodexError::WrongState {
                expected: ContractState::Frozen.to_string(),
                actual: state.to_string(),
            });
        }
        self.kv.put(keys::state_key(), ContractState::Active.encode());
        tracing::info!("trading unfrozen");
        Ok(())
    }

    /// Replace both fee rates.
    ///
    /// # Errors
    ///
    /// `NotOwner` without owner authorization; `InvalidFeeConfig` for a
    /// rate above `config.max_fee`.
    pub fn set_fees(
        &mut self,
        host: &impl HostLedger,
        taker_fee: Amount,
        maker_fee: Amount,
    ) -> Result<()> {
        self.require_owner(host)?;
        self.store_fees(taker_fee, maker_fee)
    }

    /// Replace the fee-collection address.
    ///
    /// # Errors
    ///
    /// `NotOwner` without owner authorization.
    pub fn set_fee_address(&mut self, host: &impl HostLedger, address: Address) -> Result<()> {
        self.require_owner(host)?;
        self.kv
            .put(keys::fee_address_key(), address.as_bytes().to_vec());
        tracing::info!(%address, "fee address updated");
        Ok(())
    }

    fn store_fees(&mut self, taker_fee: Amount, maker_fee: Amount) -> Result<()> {
        if taker_fee > self.config.max_fee || maker_fee > self.config.max_fee {
            return Err(CustodexError::InvalidFeeConfig {
                reason: format!(
                    "rates {taker_fee}/{maker_fee} exceed maximum {}",
                    self.config.max_fee
                ),
            });
        }
        self.kv.put_amount(keys::taker_fee_key(), taker_fee);
        self.kv.put_amount(keys::maker_fee_key(), maker_fee);
        tracing::info!(taker_fee, maker_fee, "fee rates updated");
        Ok(())
    }
}
