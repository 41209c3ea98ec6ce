//! Read-only adapter over the insured strategy vault.
//!
//! The pool only needs `total_assets` and `total_supply`. Two layouts are
//! understood:
//! - a `FeeVault` owned by this program (the vault insures itself), and
//! - any other account whose data begins with `total_assets: u64` followed by
//!   `total_supply: u64`, little-endian.
//!
//! The strategy account is pinned by key in `InsurancePool::strategy`, so the
//! layout is trusted only for the account the pool was created against.

use solana_program::{account_info::AccountInfo, program_error::ProgramError, pubkey::Pubkey};

use crate::error::InsuranceError;
use crate::math;
use crate::state::{FeeVault, FEE_VAULT_SIZE};

/// Size of the external strategy header.
pub const STRATEGY_HEADER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyTotals {
    pub total_assets: u64,
    pub total_supply: u64,
}

impl StrategyTotals {
    /// PPS scaled by 1e18. Zero supply is an arithmetic error.
    pub fn price_per_share(&self) -> Result<u128, InsuranceError> {
        math::price_per_share(self.total_assets, self.total_supply)
            .ok_or(InsuranceError::ZeroSupply)
    }

    /// Parse the external header layout.
    pub fn from_header(data: &[u8]) -> Result<Self, InsuranceError> {
        if data.len() < STRATEGY_HEADER_SIZE {
            return Err(InsuranceError::InvalidPda);
        }
        let mut assets = [0u8; 8];
        let mut supply = [0u8; 8];
        assets.copy_from_slice(&data[0..8]);
        supply.copy_from_slice(&data[8..16]);
        Ok(Self {
            total_assets: u64::from_le_bytes(assets),
            total_supply: u64::from_le_bytes(supply),
        })
    }
}

/// Load totals from the strategy account.
pub fn load_strategy(program_id: &Pubkey, strategy: &AccountInfo) -> Result<StrategyTotals, ProgramError> {
    let data = strategy.try_borrow_data()?;
    if strategy.owner == program_id && data.len() == FEE_VAULT_SIZE {
        let vault: &FeeVault = bytemuck::try_from_bytes(&data[..])
            .map_err(|_| ProgramError::InvalidAccountData)?;
        if vault.is_initialized != 1 {
            return Err(InsuranceError::NotInitialized.into());
        }
        return Ok(vault.strategy_totals());
    }
    Ok(StrategyTotals::from_header(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parse() {
        let mut data = vec![0u8; 24];
        data[0..8].copy_from_slice(&850_000u64.to_le_bytes());
        data[8..16].copy_from_slice(&1_000_000u64.to_le_bytes());
        let totals = StrategyTotals::from_header(&data).unwrap();
        assert_eq!(totals.total_assets, 850_000);
        assert_eq!(totals.total_supply, 1_000_000);
        assert_eq!(totals.price_per_share(), Ok(850_000_000_000_000_000));
    }

    #[test]
    fn test_short_header_rejected() {
        assert_eq!(StrategyTotals::from_header(&[0u8; 15]), Err(InsuranceError::InvalidPda));
    }

    #[test]
    fn test_zero_supply_has_no_pps() {
        let totals = StrategyTotals { total_assets: 5, total_supply: 0 };
        assert_eq!(totals.price_per_share(), Err(InsuranceError::ZeroSupply));
    }
}
