//! Vault Insurance Program
//!
//! A fee-routing vault, an underwriter insurance pool and a collateral share
//! token ("glue"), wired together so that part of every vault fee becomes
//! premium for whoever underwrites the vault's downside.
//!
//! Architecture:
//! - FeeVault: share vault over an SPL asset. Management fees accrue over time,
//!   performance fees on reported gains. Each fee is split between a treasury
//!   and a premium sink.
//! - InsurancePool: underwriters stake the asset and earn premium through a
//!   per-share accumulator. A checkpoint of the insured strategy's PPS is
//!   ratcheted up over time; once it has matured, a PPS drop beyond the
//!   deductible lets anyone drain the pool to the insured vault for a bounty.
//! - GlueToken: alternative sink whose units appreciate as premium lands in
//!   its collateral pool without minting.
//! - Registry: write-once vault -> pool mapping.
//!
//! Instructions:
//!   0 - InitVault:          Create a fee vault bound to a premium sink
//!   1 - Deposit:            Deposit asset, receive vault shares
//!   2 - Withdraw:           Burn vault shares for asset
//!   3 - AccrueFees:         Charge the management fee, route it
//!   4 - Report:             Keeper reports gain / loss, performance fee routed
//!   5 - UpdateVaultConfig:  Admin updates fee rates / split
//!   6 - InitPool:           Create an insurance pool for a strategy
//!   7 - Stake:              Stake underwriting capital
//!   8 - Unstake:            Withdraw capital (frozen while a loss is pending)
//!   9 - RecordPremium:      Premium source credits stakers
//!  10 - Claim:              Withdraw accumulated premium
//!  11 - UpdateCheckpoint:   Ratchet the strategy PPS checkpoint
//!  12 - TriggerLoss:        Pay the pool out after a loss beyond the deductible
//!  13 - SetParameters:      Admin updates deductible, floor, maturity, reward
//!  14 - InitGlue:           Create a glue collateral token
//!  15 - GlueDeposit:        Add collateral without minting
//!  16 - GlueMint:           Mint units against new collateral
//!  17 - GlueRedeem:         Burn units for collateral
//!  18 - InitRegistry:       Create the registry singleton
//!  19 - RegisterVault:      Record a vault -> pool pair

pub mod constants;
pub mod cpi;
pub mod error;
pub mod instruction;
pub mod math;
pub mod processor;
pub mod state;
pub mod strategy;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;
