use bytemuck::{Pod, Zeroable};
use solana_program::pubkey::Pubkey;

use crate::constants::{
    BPS_DENOMINATOR, FEE_VAULT_SEED, GLUE_AUTH_SEED, GLUE_BALANCE_SEED, GLUE_SEED,
    LOSS_RECORD_SEED, MAX_DURATION_SECS, MIN_CHECKPOINT_INTERVAL_SECS, POOL_AUTH_SEED, POOL_SEED,
    REGISTRY_ENTRY_SEED, REGISTRY_SEED, SINK_GLUE, SINK_INSURANCE_POOL, STAKE_POSITION_SEED, VAULT_AUTH_SEED, VAULT_POSITION_SEED,
};
use crate::error::InsuranceError;
use crate::math;
use crate::strategy::StrategyTotals;

// ═══════════════════════════════════════════════════════════════
// Premium sink seam
// ═══════════════════════════════════════════════════════════════

/// One-directional push interface the fee vault uses to hand premium to
/// whatever absorbs it. Implementations mutate only on `Ok(true)`.
pub trait PremiumSink {
    /// Returns `true` when the premium was credited and the asset must be
    /// transferred to the sink, `false` when it should stay upstream.
    fn accept_premium(&mut self, source: &[u8; 32], amount: u64) -> Result<bool, InsuranceError>;
}

/// Result of a fee accrual or a performance-fee report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeRouting {
    pub fee: u64,
    /// Sent to the treasury token account.
    pub treasury: u64,
    /// Credited to the sink; must be transferred to `sink_token`.
    pub premium_routed: u64,
    /// Insurance portion the sink declined; stays in `total_assets`.
    pub premium_retained: u64,
}

impl FeeRouting {
    /// Total asset that leaves the vault token account.
    pub fn outflow(&self) -> u64 {
        self.treasury.saturating_add(self.premium_routed)
    }
}

// ═══════════════════════════════════════════════════════════════
// Fee-routing vault
// ═══════════════════════════════════════════════════════════════

/// Fee-routing vault, one per `vault_id`.
/// PDA seeds: [b"fee_vault", vault_id]
///
/// Wraps a share vault over the asset mint. Management fees (time-based)
/// and performance fees (gain-based) leave `total_assets` and are split
/// between the treasury and the premium sink (insurance pool or glue).
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct FeeVault {
    /// Whether the vault is initialized (1 = yes, 0 = no)
    pub is_initialized: u8,

    /// Bump seed for the vault PDA
    pub bump: u8,

    /// Bump seed for the vault authority PDA
    pub vault_authority_bump: u8,

    /// SINK_INSURANCE_POOL or SINK_GLUE
    pub sink_kind: u8,

    /// Padding for alignment
    pub _padding: [u8; 4],

    /// Arbitrary key this vault is derived from
    pub vault_id: [u8; 32],

    /// Owner (fee configuration, report)
    pub admin: [u8; 32],

    /// Keeper allowed to report gains / losses
    pub keeper: [u8; 32],

    /// Asset mint
    pub asset_mint: [u8; 32],

    /// Token account holding deposits (authority = vault_auth PDA)
    pub vault_token: [u8; 32],

    /// Treasury token account (receives the treasury portion)
    pub treasury_token: [u8; 32],

    /// Insurance pool or glue token receiving premium
    pub premium_sink: [u8; 32],

    /// Token account of the sink that receives premium asset
    pub sink_token: [u8; 32],

    /// Assets under management (bookkeeping)
    pub total_assets: u64,

    /// Vault shares outstanding
    pub total_supply: u64,

    /// Unix timestamp of the last management-fee accrual
    pub last_fee_timestamp: i64,

    /// Annual management fee in bps
    pub management_fee_bps: u64,

    /// Performance fee on reported gains in bps
    pub performance_fee_bps: u64,

    /// Share of every fee routed to the sink, in bps
    pub insurance_split_bps: u64,

    /// Lifetime fees paid to the treasury
    pub total_fees_to_treasury: u64,

    /// Lifetime premium forwarded to the sink
    pub total_premium_routed: u64,

    /// Lifetime premium kept because the sink had nobody to credit
    pub total_premium_retained: u64,

    /// Reserved for future use
    pub _reserved: [u8; 64],
}

/// Size of FeeVault in bytes
pub const FEE_VAULT_SIZE: usize = core::mem::size_of::<FeeVault>();

/// Per-holder vault shares.
/// PDA seeds: [b"vault_position", fee_vault, owner]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct VaultPosition {
    pub is_initialized: u8,
    pub bump: u8,
    pub _padding: [u8; 6],
    pub vault: [u8; 32],
    pub owner: [u8; 32],
    pub shares: u64,
    pub _reserved: [u8; 32],
}

pub const VAULT_POSITION_SIZE: usize = core::mem::size_of::<VaultPosition>();

/// Fee configuration written at init and by UpdateVaultConfig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeConfig {
    pub management_fee_bps: u64,
    pub performance_fee_bps: u64,
    pub insurance_split_bps: u64,
}

impl FeeConfig {
    pub fn validate(&self) -> Result<(), InsuranceError> {
        if self.management_fee_bps > BPS_DENOMINATOR
            || self.performance_fee_bps > BPS_DENOMINATOR
            || self.insurance_split_bps > BPS_DENOMINATOR
        {
            return Err(InsuranceError::InvalidParameter);
        }
        Ok(())
    }
}

impl FeeVault {
    pub fn strategy_totals(&self) -> StrategyTotals {
        StrategyTotals {
            total_assets: self.total_assets,
            total_supply: self.total_supply,
        }
    }

    pub fn fee_config(&self) -> FeeConfig {
        FeeConfig {
            management_fee_bps: self.management_fee_bps,
            performance_fee_bps: self.performance_fee_bps,
            insurance_split_bps: self.insurance_split_bps,
        }
    }

    pub fn set_fee_config(&mut self, config: FeeConfig) -> Result<(), InsuranceError> {
        config.validate()?;
        self.management_fee_bps = config.management_fee_bps;
        self.performance_fee_bps = config.performance_fee_bps;
        self.insurance_split_bps = config.insurance_split_bps;
        Ok(())
    }

    /// Admin-only partial config update.
    pub fn update_config(
        &mut self,
        caller: &[u8; 32],
        management_fee_bps: Option<u64>,
        performance_fee_bps: Option<u64>,
        insurance_split_bps: Option<u64>,
    ) -> Result<(), InsuranceError> {
        if *caller != self.admin {
            return Err(InsuranceError::Unauthorized);
        }
        let current = self.fee_config();
        self.set_fee_config(FeeConfig {
            management_fee_bps: management_fee_bps.unwrap_or(current.management_fee_bps),
            performance_fee_bps: performance_fee_bps.unwrap_or(current.performance_fee_bps),
            insurance_split_bps: insurance_split_bps.unwrap_or(current.insurance_split_bps),
        })
    }

    /// Mint shares for `amount` at the current PPS (1:1 for the first deposit).
    pub fn deposit(
        &mut self,
        position: &mut VaultPosition,
        amount: u64,
        now: i64,
    ) -> Result<u64, InsuranceError> {
        if amount == 0 {
            return Err(InsuranceError::ZeroAmount);
        }
        let shares = math::shares_for_deposit(self.total_supply, self.total_assets, amount)
            .ok_or(InsuranceError::Overflow)?;
        if shares == 0 {
            return Err(InsuranceError::ZeroAmount);
        }
        let total_assets = self.total_assets.checked_add(amount).ok_or(InsuranceError::Overflow)?;
        let total_supply = self.total_supply.checked_add(shares).ok_or(InsuranceError::Overflow)?;
        let position_shares = position.shares.checked_add(shares).ok_or(InsuranceError::Overflow)?;

        // Nothing accrues while the vault is empty.
        if self.total_supply == 0 {
            self.last_fee_timestamp = now;
        }
        self.total_assets = total_assets;
        self.total_supply = total_supply;
        position.shares = position_shares;
        Ok(shares)
    }

    /// Burn `shares` and return the proportional amount.
    /// `liquid_balance` is what the vault token account can actually pay.
    pub fn withdraw(
        &mut self,
        position: &mut VaultPosition,
        shares: u64,
        liquid_balance: u64,
    ) -> Result<u64, InsuranceError> {
        if shares == 0 {
            return Err(InsuranceError::ZeroAmount);
        }
        if shares > position.shares {
            return Err(InsuranceError::InsufficientShares);
        }
        let amount = math::assets_for_shares(self.total_supply, self.total_assets, shares)
            .ok_or(InsuranceError::ZeroSupply)?;
        if amount == 0 {
            return Err(InsuranceError::ZeroAmount);
        }
        if amount > liquid_balance {
            return Err(InsuranceError::InsufficientLiquidity);
        }
        let total_assets = self.total_assets.checked_sub(amount).ok_or(InsuranceError::Overflow)?;
        let total_supply = self.total_supply.checked_sub(shares).ok_or(InsuranceError::Overflow)?;

        self.total_assets = total_assets;
        self.total_supply = total_supply;
        position.shares -= shares;
        Ok(amount)
    }

    /// Book an insurance payout already transferred into `vault_token`.
    pub fn receive_compensation(&mut self, amount: u64) -> Result<u64, InsuranceError> {
        if self.total_supply == 0 {
            return Err(InsuranceError::ZeroSupply);
        }
        self.total_assets = self.total_assets.checked_add(amount).ok_or(InsuranceError::Overflow)?;
        Ok(self.total_assets)
    }

    /// Management fee due at `now`, split `(treasury, insurance)`.
    /// The fee is capped at `total_assets`.
    pub fn management_fee_due(&self, now: i64) -> Result<(u64, u64, u64), InsuranceError> {
        let elapsed = now.saturating_sub(self.last_fee_timestamp);
        if elapsed <= 0 {
            return Err(InsuranceError::NoTimeElapsed);
        }
        let fee = math::management_fee(self.total_assets, self.management_fee_bps, elapsed as u64)
            .ok_or(InsuranceError::Overflow)?
            .min(self.total_assets);
        let (treasury, insurance) = math::split_fee(fee, self.insurance_split_bps)
            .ok_or(InsuranceError::Overflow)?;
        Ok((fee, treasury, insurance))
    }

    /// Accrue the management fee and route it.
    ///
    /// `vault_authority` is the identity presented to the sink; the sink is
    /// the account at `premium_sink`.
    pub fn accrue_fees(
        &mut self,
        now: i64,
        liquid_balance: u64,
        vault_authority: &[u8; 32],
        sink: &mut dyn PremiumSink,
    ) -> Result<FeeRouting, InsuranceError> {
        let (fee, treasury, insurance) = self.management_fee_due(now)?;
        let routing = self.route_fee(fee, treasury, insurance, liquid_balance, vault_authority, sink)?;
        self.last_fee_timestamp = now;
        Ok(routing)
    }

    /// Apply a reported profit / loss and charge the performance fee on gains.
    ///
    /// `liquid_balance` must already include the gain pulled from the reporter.
    pub fn report(
        &mut self,
        caller: &[u8; 32],
        gain: u64,
        loss: u64,
        liquid_balance: u64,
        vault_authority: &[u8; 32],
        sink: &mut dyn PremiumSink,
    ) -> Result<FeeRouting, InsuranceError> {
        if *caller != self.keeper && *caller != self.admin {
            return Err(InsuranceError::Unauthorized);
        }
        if self.total_supply == 0 {
            return Err(InsuranceError::ZeroSupply);
        }
        let before = self.total_assets;
        let after = before
            .checked_add(gain)
            .ok_or(InsuranceError::Overflow)?
            .saturating_sub(loss);

        let fee = math::performance_fee(gain, self.performance_fee_bps)
            .ok_or(InsuranceError::Overflow)?
            .min(after);
        let (treasury, insurance) = math::split_fee(fee, self.insurance_split_bps)
            .ok_or(InsuranceError::Overflow)?;

        self.total_assets = after;
        match self.route_fee(fee, treasury, insurance, liquid_balance, vault_authority, sink) {
            Ok(routing) => Ok(routing),
            Err(e) => {
                self.total_assets = before;
                Err(e)
            }
        }
    }

    fn route_fee(
        &mut self,
        fee: u64,
        treasury: u64,
        insurance: u64,
        liquid_balance: u64,
        vault_authority: &[u8; 32],
        sink: &mut dyn PremiumSink,
    ) -> Result<FeeRouting, InsuranceError> {
        if fee > liquid_balance {
            return Err(InsuranceError::InsufficientLiquidity);
        }
        let fees_to_treasury = self
            .total_fees_to_treasury
            .checked_add(treasury)
            .ok_or(InsuranceError::Overflow)?;

        // Last fallible step; the sink commits only on Ok(true).
        let routed = sink.accept_premium(vault_authority, insurance)?;
        let (premium_routed, premium_retained) = if routed { (insurance, 0) } else { (0, insurance) };

        self.total_assets = self.total_assets.saturating_sub(treasury + premium_routed);
        self.total_fees_to_treasury = fees_to_treasury;
        self.total_premium_routed = self.total_premium_routed.saturating_add(premium_routed);
        self.total_premium_retained = self.total_premium_retained.saturating_add(premium_retained);

        Ok(FeeRouting {
            fee,
            treasury,
            premium_routed,
            premium_retained,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
// Insurance pool
// ═══════════════════════════════════════════════════════════════

/// Insurance pool, one per insured strategy.
/// PDA seeds: [b"insurance_pool", strategy]
///
/// Holds underwriter capital (`pool_assets`) and unclaimed premium
/// (`premium_reserve`) in one token account owned by the pool authority
/// PDA. Premium is distributed through a per-share accumulator, so
/// recording premium is O(1) regardless of the number of stakers.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct InsurancePool {
    /// Whether the pool is initialized (1 = yes, 0 = no)
    pub is_initialized: u8,

    /// Bump seed for the pool PDA
    pub bump: u8,

    /// Bump seed for the pool authority PDA
    pub pool_authority_bump: u8,

    /// Padding for alignment
    pub _padding: [u8; 5],

    /// Insured strategy account (source of totalAssets / totalSupply)
    pub strategy: [u8; 32],

    /// Owner (setParameters)
    pub admin: [u8; 32],

    /// Asset mint
    pub asset_mint: [u8; 32],

    /// Token account holding stake capital + premium (authority = pool_auth PDA)
    pub pool_token: [u8; 32],

    /// Token account that receives loss payouts for the insured vault
    pub payout_recipient: [u8; 32],

    /// Identity allowed to record premium (the fee vault authority PDA)
    pub premium_source: [u8; 32],

    /// Staked capital currently at risk
    pub pool_assets: u64,

    /// Stake shares outstanding in the current epoch
    pub total_stake_shares: u64,

    /// Recorded premium not yet claimed
    pub premium_reserve: u64,

    /// Premium per share accumulator (u128 LE, scaled 1e18)
    pub premium_per_share_index: [u8; 16],

    /// Checkpointed strategy PPS (u128 LE, scaled 1e18)
    pub checkpoint_pps: [u8; 16],

    /// Unix timestamp of the last checkpoint
    pub checkpoint_timestamp: i64,

    /// Minimum PPS drop, in bps, before a loss is payable
    pub deductible_bps: u64,

    /// Age a checkpoint must reach before a loss can be claimed against it
    pub checkpoint_maturity_secs: u64,

    /// Share of the payout awarded to the trigger caller, in bps
    pub caller_reward_bps: u64,

    /// Minimum pool_assets for a loss to be triggerable
    pub min_liquidity_floor: u64,

    /// No loss can be triggered before this timestamp
    pub cooldown_until: i64,

    /// Cooldown length applied after each loss
    pub cooldown_secs: u64,

    /// Minimum spacing between checkpoint updates
    pub min_checkpoint_interval: u64,

    /// Incremented on every loss; positions from older epochs hold no shares
    pub loss_epoch: u64,

    /// Lifetime premium recorded
    pub total_premium_recorded: u64,

    /// Lifetime premium claimed
    pub total_premium_claimed: u64,

    /// Lifetime loss payouts (net + caller rewards)
    pub total_paid_out: u64,

    /// Reserved for future use
    pub _reserved: [u8; 64],
}

/// Size of InsurancePool in bytes
pub const INSURANCE_POOL_SIZE: usize = core::mem::size_of::<InsurancePool>();

/// Per-underwriter stake.
/// PDA seeds: [b"stake_position", pool, staker]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct StakePosition {
    pub is_initialized: u8,
    pub bump: u8,
    pub _padding: [u8; 6],
    pub pool: [u8; 32],
    pub staker: [u8; 32],

    /// Stake shares (meaningful only while `epoch == pool.loss_epoch`)
    pub stake_shares: u64,

    /// Premium settled but not yet claimed
    pub accrued_premium: u64,

    /// Pool loss epoch the shares belong to
    pub epoch: u64,

    /// Accumulator value at the last settlement (u128 LE)
    pub premium_index_snapshot: [u8; 16],

    pub _reserved: [u8; 32],
}

pub const STAKE_POSITION_SIZE: usize = core::mem::size_of::<StakePosition>();

/// Immutable history of one loss event.
/// PDA seeds: [b"loss_record", pool, epoch.to_le_bytes()]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct LossRecord {
    pub is_initialized: u8,
    pub bump: u8,
    pub _padding: [u8; 6],
    pub pool: [u8; 32],
    pub caller: [u8; 32],
    /// Epoch that ended with this loss
    pub epoch: u64,
    pub timestamp: i64,
    pub payout: u64,
    pub caller_reward: u64,
    pub checkpoint_pps: [u8; 16],
    pub observed_pps: [u8; 16],
    /// Accumulator value when the epoch ended (u128 LE)
    pub final_premium_index: [u8; 16],
    pub _reserved: [u8; 32],
}

pub const LOSS_RECORD_SIZE: usize = core::mem::size_of::<LossRecord>();

/// Pool life-cycle as seen at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    /// Accepting stakes, premium flowing, loss triggerable
    Active,
    /// Capital drained, cooldown in force
    LossTriggered,
}

/// Owner-tunable loss parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolParameters {
    pub deductible_bps: u64,
    pub min_liquidity_floor: u64,
    pub checkpoint_maturity_secs: u64,
    pub caller_reward_bps: u64,
}

impl PoolParameters {
    pub fn validate(&self) -> Result<(), InsuranceError> {
        if self.deductible_bps > BPS_DENOMINATOR
            || self.caller_reward_bps > BPS_DENOMINATOR
            || self.checkpoint_maturity_secs > MAX_DURATION_SECS
        {
            return Err(InsuranceError::InvalidParameter);
        }
        Ok(())
    }
}

/// Validate the fixed timers chosen at pool creation.
pub fn validate_pool_timers(cooldown_secs: u64, min_checkpoint_interval: u64) -> Result<(), InsuranceError> {
    if cooldown_secs > MAX_DURATION_SECS
        || min_checkpoint_interval < MIN_CHECKPOINT_INTERVAL_SECS
        || min_checkpoint_interval > MAX_DURATION_SECS
    {
        return Err(InsuranceError::InvalidParameter);
    }
    Ok(())
}

/// Stored durations as clock seconds. Values past `i64::MAX` saturate.
fn secs(duration: u64) -> i64 {
    i64::try_from(duration).unwrap_or(i64::MAX)
}

/// Outcome of a successful `trigger_loss`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LossPayout {
    /// Epoch that this loss closed
    pub epoch: u64,
    pub timestamp: i64,
    pub checkpoint_pps: u128,
    pub observed_pps: u128,
    /// Entire pool capital
    pub payout: u64,
    /// Transferred to the payout recipient
    pub net: u64,
    /// Transferred to the caller
    pub caller_reward: u64,
    pub final_premium_index: u128,
}

/// Position brought up to date against the pool accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SettledPosition {
    shares: u64,
    accrued: u64,
    snapshot: u128,
    epoch: u64,
}

impl InsurancePool {
    pub fn premium_index(&self) -> u128 {
        u128::from_le_bytes(self.premium_per_share_index)
    }

    pub fn set_premium_index(&mut self, index: u128) {
        self.premium_per_share_index = index.to_le_bytes();
    }

    pub fn checkpoint(&self) -> u128 {
        u128::from_le_bytes(self.checkpoint_pps)
    }

    pub fn set_checkpoint(&mut self, pps: u128, now: i64) {
        self.checkpoint_pps = pps.to_le_bytes();
        self.checkpoint_timestamp = now;
    }

    pub fn parameters(&self) -> PoolParameters {
        PoolParameters {
            deductible_bps: self.deductible_bps,
            min_liquidity_floor: self.min_liquidity_floor,
            checkpoint_maturity_secs: self.checkpoint_maturity_secs,
            caller_reward_bps: self.caller_reward_bps,
        }
    }

    pub fn apply_parameters(&mut self, params: PoolParameters) -> Result<(), InsuranceError> {
        params.validate()?;
        self.deductible_bps = params.deductible_bps;
        self.min_liquidity_floor = params.min_liquidity_floor;
        self.checkpoint_maturity_secs = params.checkpoint_maturity_secs;
        self.caller_reward_bps = params.caller_reward_bps;
        Ok(())
    }

    /// Owner-only parameter update.
    pub fn set_parameters(
        &mut self,
        caller: &[u8; 32],
        params: PoolParameters,
    ) -> Result<(), InsuranceError> {
        if *caller != self.admin {
            return Err(InsuranceError::Unauthorized);
        }
        self.apply_parameters(params)
    }

    pub fn status(&self, now: i64) -> PoolStatus {
        if now < self.cooldown_until {
            PoolStatus::LossTriggered
        } else {
            PoolStatus::Active
        }
    }

    fn checkpoint_age(&self, now: i64) -> i64 {
        now.saturating_sub(self.checkpoint_timestamp)
    }

    /// True when a loss against the current checkpoint could be paid,
    /// cooldown aside. A pool below its liquidity floor cannot pay, so it
    /// never counts as pending.
    pub fn loss_pending(&self, now: i64, current_pps: u128) -> bool {
        let checkpoint = self.checkpoint();
        checkpoint > 0
            && self.checkpoint_age(now) >= secs(self.checkpoint_maturity_secs)
            && math::loss_exceeds_deductible(checkpoint, current_pps, self.deductible_bps)
            && self.meets_liquidity_floor()
    }

    fn meets_liquidity_floor(&self) -> bool {
        self.pool_assets > 0 && self.pool_assets >= self.min_liquidity_floor
    }

    /// Capital an underwriter may withdraw right now. Frozen while a
    /// loss is pending so stakers cannot exit ahead of the claim.
    pub fn available_capital(&self, now: i64, current_pps: Option<u128>) -> u64 {
        match current_pps {
            Some(pps) if self.loss_pending(now, pps) => 0,
            _ => self.pool_assets,
        }
    }

    fn settle(
        &self,
        position: &StakePosition,
        epoch_end_index: Option<u128>,
    ) -> Result<SettledPosition, InsuranceError> {
        let index = self.premium_index();
        let snapshot = u128::from_le_bytes(position.premium_index_snapshot);

        if position.epoch == self.loss_epoch {
            let earned = math::premium_earned(position.stake_shares, index, snapshot)
                .ok_or(InsuranceError::Overflow)?;
            return Ok(SettledPosition {
                shares: position.stake_shares,
                accrued: position.accrued_premium.checked_add(earned).ok_or(InsuranceError::Overflow)?,
                snapshot: index,
                epoch: self.loss_epoch,
            });
        }

        // Shares were wiped by a loss; premium earned before it still counts.
        let earned = if position.stake_shares == 0 {
            0
        } else {
            let end = epoch_end_index.ok_or(InsuranceError::InvalidPda)?;
            math::premium_earned(position.stake_shares, end, snapshot)
                .ok_or(InsuranceError::Overflow)?
        };
        Ok(SettledPosition {
            shares: 0,
            accrued: position.accrued_premium.checked_add(earned).ok_or(InsuranceError::Overflow)?,
            snapshot: index,
            epoch: self.loss_epoch,
        })
    }

    fn commit_position(position: &mut StakePosition, settled: SettledPosition) {
        position.stake_shares = settled.shares;
        position.accrued_premium = settled.accrued;
        position.premium_index_snapshot = settled.snapshot.to_le_bytes();
        position.epoch = settled.epoch;
    }

    /// Shares the position holds in the current epoch.
    pub fn effective_shares(&self, position: &StakePosition) -> u64 {
        if position.epoch == self.loss_epoch {
            position.stake_shares
        } else {
            0
        }
    }

    /// Stake `amount`; returns shares minted.
    ///
    /// `epoch_end_index` is the final accumulator of the position's epoch and
    /// is only required when the position predates the latest loss.
    pub fn stake(
        &mut self,
        position: &mut StakePosition,
        amount: u64,
        epoch_end_index: Option<u128>,
    ) -> Result<u64, InsuranceError> {
        if amount == 0 {
            return Err(InsuranceError::ZeroAmount);
        }
        let settled = self.settle(position, epoch_end_index)?;
        let shares = math::shares_for_deposit(self.total_stake_shares, self.pool_assets, amount)
            .ok_or(InsuranceError::Overflow)?;
        if shares == 0 {
            return Err(InsuranceError::ZeroAmount);
        }
        let pool_assets = self.pool_assets.checked_add(amount).ok_or(InsuranceError::Overflow)?;
        let total_shares = self
            .total_stake_shares
            .checked_add(shares)
            .ok_or(InsuranceError::Overflow)?;
        let position_shares = settled.shares.checked_add(shares).ok_or(InsuranceError::Overflow)?;

        self.pool_assets = pool_assets;
        self.total_stake_shares = total_shares;
        Self::commit_position(
            position,
            SettledPosition {
                shares: position_shares,
                ..settled
            },
        );
        Ok(shares)
    }

    /// Burn `shares`; returns the amount owed to the staker.
    pub fn unstake(
        &mut self,
        position: &mut StakePosition,
        shares: u64,
        now: i64,
        current_pps: Option<u128>,
        epoch_end_index: Option<u128>,
    ) -> Result<u64, InsuranceError> {
        if shares == 0 {
            return Err(InsuranceError::ZeroAmount);
        }
        let settled = self.settle(position, epoch_end_index)?;
        if shares > settled.shares {
            return Err(InsuranceError::InsufficientShares);
        }
        let amount = math::assets_for_shares(self.total_stake_shares, self.pool_assets, shares)
            .ok_or(InsuranceError::ZeroSupply)?;
        if amount > self.available_capital(now, current_pps) {
            return Err(InsuranceError::InsufficientLiquidity);
        }
        if amount == 0 {
            return Err(InsuranceError::ZeroAmount);
        }
        let pool_assets = self.pool_assets.checked_sub(amount).ok_or(InsuranceError::Overflow)?;
        let total_shares = self
            .total_stake_shares
            .checked_sub(shares)
            .ok_or(InsuranceError::Overflow)?;

        self.pool_assets = pool_assets;
        self.total_stake_shares = total_shares;
        Self::commit_position(
            position,
            SettledPosition {
                shares: settled.shares - shares,
                ..settled
            },
        );
        Ok(amount)
    }

    /// Credit premium to all current stakers.
    ///
    /// Returns `false` (no-op) when there is nobody to credit; the caller
    /// keeps the asset.
    pub fn record_premium(&mut self, source: &[u8; 32], amount: u64) -> Result<bool, InsuranceError> {
        if *source != self.premium_source {
            return Err(InsuranceError::NotPremiumSource);
        }
        if self.total_stake_shares == 0 || amount == 0 {
            return Ok(false);
        }
        let delta = math::premium_index_delta(amount, self.total_stake_shares)
            .ok_or(InsuranceError::Overflow)?;
        let index = self.premium_index().checked_add(delta).ok_or(InsuranceError::Overflow)?;
        let reserve = self.premium_reserve.checked_add(amount).ok_or(InsuranceError::Overflow)?;
        let recorded = self
            .total_premium_recorded
            .checked_add(amount)
            .ok_or(InsuranceError::Overflow)?;

        self.set_premium_index(index);
        self.premium_reserve = reserve;
        self.total_premium_recorded = recorded;
        Ok(true)
    }

    /// Premium the position could claim now.
    pub fn pending_premium(
        &self,
        position: &StakePosition,
        epoch_end_index: Option<u128>,
    ) -> Result<u64, InsuranceError> {
        Ok(self.settle(position, epoch_end_index)?.accrued)
    }

    /// Zero the position's pending premium and return it for transfer.
    pub fn claim(
        &mut self,
        position: &mut StakePosition,
        epoch_end_index: Option<u128>,
    ) -> Result<u64, InsuranceError> {
        let settled = self.settle(position, epoch_end_index)?;
        let amount = settled.accrued;
        if amount == 0 {
            return Err(InsuranceError::NothingToClaim);
        }
        let reserve = self
            .premium_reserve
            .checked_sub(amount)
            .ok_or(InsuranceError::InsufficientLiquidity)?;
        let claimed = self
            .total_premium_claimed
            .checked_add(amount)
            .ok_or(InsuranceError::Overflow)?;

        self.premium_reserve = reserve;
        self.total_premium_claimed = claimed;
        Self::commit_position(
            position,
            SettledPosition {
                accrued: 0,
                ..settled
            },
        );
        Ok(amount)
    }

    /// Ratchet the checkpoint up to the strategy's current PPS.
    ///
    /// The first checkpoint is always accepted; afterwards at least
    /// `min_checkpoint_interval` must pass and PPS must be strictly higher.
    pub fn update_checkpoint(&mut self, now: i64, totals: StrategyTotals) -> Result<u128, InsuranceError> {
        let checkpoint = self.checkpoint();
        if checkpoint > 0 && self.checkpoint_age(now) < secs(self.min_checkpoint_interval) {
            return Err(InsuranceError::CheckpointTooSoon);
        }
        let pps = totals.price_per_share()?;
        if pps <= checkpoint {
            return Err(InsuranceError::PpsNotIncreased);
        }
        self.set_checkpoint(pps, now);
        Ok(pps)
    }

    /// Drain the pool to compensate the insured vault.
    ///
    /// Every precondition is checked before anything is written; on error
    /// the pool is untouched. On success the caller must transfer
    /// `net` to `payout_recipient` and `caller_reward` to the caller.
    pub fn trigger_loss(&mut self, now: i64, totals: StrategyTotals) -> Result<LossPayout, InsuranceError> {
        let checkpoint = self.checkpoint();
        if checkpoint == 0 {
            return Err(InsuranceError::NoCheckpoint);
        }
        if now < self.cooldown_until {
            return Err(InsuranceError::CooldownActive);
        }
        if self.checkpoint_age(now) < secs(self.checkpoint_maturity_secs) {
            return Err(InsuranceError::CheckpointNotMatured);
        }
        let current = totals.price_per_share()?;
        if !math::loss_exceeds_deductible(checkpoint, current, self.deductible_bps) {
            return Err(InsuranceError::LossBelowDeductible);
        }
        if !self.meets_liquidity_floor() {
            return Err(InsuranceError::BelowLiquidityFloor);
        }

        let payout = self.pool_assets;
        let (net, caller_reward) = math::split_payout(payout, self.caller_reward_bps)
            .ok_or(InsuranceError::Overflow)?;
        let cooldown_until = now
            .checked_add(secs(self.cooldown_secs))
            .ok_or(InsuranceError::Overflow)?;
        let next_epoch = self.loss_epoch.checked_add(1).ok_or(InsuranceError::Overflow)?;
        let paid_out = self.total_paid_out.checked_add(payout).ok_or(InsuranceError::Overflow)?;

        let result = LossPayout {
            epoch: self.loss_epoch,
            timestamp: now,
            checkpoint_pps: checkpoint,
            observed_pps: current,
            payout,
            net,
            caller_reward,
            final_premium_index: self.premium_index(),
        };

        self.pool_assets = 0;
        self.total_stake_shares = 0;
        self.loss_epoch = next_epoch;
        self.cooldown_until = cooldown_until;
        self.total_paid_out = paid_out;
        // The realised loss becomes the new baseline.
        self.set_checkpoint(current, now);
        Ok(result)
    }
}

impl PremiumSink for InsurancePool {
    fn accept_premium(&mut self, source: &[u8; 32], amount: u64) -> Result<bool, InsuranceError> {
        self.record_premium(source, amount)
    }
}

impl StakePosition {
    /// Initialize a fresh position at the pool's current epoch and index.
    pub fn open(&mut self, pool_key: &[u8; 32], staker: &[u8; 32], bump: u8, pool: &InsurancePool) {
        self.is_initialized = 1;
        self.bump = bump;
        self.pool = *pool_key;
        self.staker = *staker;
        self.stake_shares = 0;
        self.accrued_premium = 0;
        self.epoch = pool.loss_epoch;
        self.premium_index_snapshot = pool.premium_per_share_index;
    }
}

impl LossRecord {
    pub fn write(&mut self, pool_key: &[u8; 32], caller: &[u8; 32], bump: u8, loss: &LossPayout) {
        self.is_initialized = 1;
        self.bump = bump;
        self.pool = *pool_key;
        self.caller = *caller;
        self.epoch = loss.epoch;
        self.timestamp = loss.timestamp;
        self.payout = loss.payout;
        self.caller_reward = loss.caller_reward;
        self.checkpoint_pps = loss.checkpoint_pps.to_le_bytes();
        self.observed_pps = loss.observed_pps.to_le_bytes();
        self.final_premium_index = loss.final_premium_index.to_le_bytes();
    }

    pub fn final_index(&self) -> u128 {
        u128::from_le_bytes(self.final_premium_index)
    }
}

// ═══════════════════════════════════════════════════════════════
// Glue: collateral share token
// ═══════════════════════════════════════════════════════════════

/// Collateral share token whose redemption value appreciates as assets
/// are deposited into its backing pool without minting.
/// PDA seeds: [b"glue", glue_id]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct GlueToken {
    pub is_initialized: u8,
    pub bump: u8,
    pub authority_bump: u8,
    pub _padding: [u8; 5],
    pub glue_id: [u8; 32],
    pub admin: [u8; 32],
    /// Identity (besides admin) allowed to mint
    pub minter: [u8; 32],
    pub asset_mint: [u8; 32],
    /// Token account backing the units (authority = glue_auth PDA)
    pub collateral_token: [u8; 32],
    pub total_supply: u64,
    pub collateral_pool: u64,
    /// Lifetime collateral added by `deposit` (no mint)
    pub total_deposited: u64,
    /// Lifetime collateral paid out by `redeem`
    pub total_redeemed: u64,
    pub _reserved: [u8; 64],
}

pub const GLUE_TOKEN_SIZE: usize = core::mem::size_of::<GlueToken>();

/// Per-holder glue units.
/// PDA seeds: [b"glue_balance", glue, holder]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct GlueBalance {
    pub is_initialized: u8,
    pub bump: u8,
    pub _padding: [u8; 6],
    pub glue: [u8; 32],
    pub holder: [u8; 32],
    pub units: u64,
    pub _reserved: [u8; 32],
}

pub const GLUE_BALANCE_SIZE: usize = core::mem::size_of::<GlueBalance>();

impl GlueToken {
    pub fn redemption_value_per_unit(&self) -> Option<u128> {
        math::redemption_value_per_unit(self.collateral_pool, self.total_supply)
    }

    /// Add backing without minting.
    pub fn deposit(&mut self, amount: u64) -> Result<(), InsuranceError> {
        if amount == 0 {
            return Err(InsuranceError::ZeroAmount);
        }
        let collateral = self.collateral_pool.checked_add(amount).ok_or(InsuranceError::Overflow)?;
        let deposited = self.total_deposited.checked_add(amount).ok_or(InsuranceError::Overflow)?;
        self.collateral_pool = collateral;
        self.total_deposited = deposited;
        Ok(())
    }

    /// Mint units against `amount` of new collateral. Admin or minter only.
    pub fn mint(
        &mut self,
        caller: &[u8; 32],
        balance: &mut GlueBalance,
        amount: u64,
    ) -> Result<u64, InsuranceError> {
        if *caller != self.minter && *caller != self.admin {
            return Err(InsuranceError::Unauthorized);
        }
        if amount == 0 {
            return Err(InsuranceError::ZeroAmount);
        }
        let units = math::glue_units_for_mint(self.total_supply, self.collateral_pool, amount)
            .ok_or(InsuranceError::Overflow)?;
        if units == 0 {
            return Err(InsuranceError::ZeroAmount);
        }
        let supply = self.total_supply.checked_add(units).ok_or(InsuranceError::Overflow)?;
        let collateral = self.collateral_pool.checked_add(amount).ok_or(InsuranceError::Overflow)?;
        let held = balance.units.checked_add(units).ok_or(InsuranceError::Overflow)?;

        self.total_supply = supply;
        self.collateral_pool = collateral;
        balance.units = held;
        Ok(units)
    }

    /// Burn `units`, returning their share of the collateral.
    pub fn redeem(&mut self, balance: &mut GlueBalance, units: u64) -> Result<u64, InsuranceError> {
        if units == 0 {
            return Err(InsuranceError::ZeroAmount);
        }
        if units > balance.units {
            return Err(InsuranceError::InsufficientShares);
        }
        let amount = math::assets_for_shares(self.total_supply, self.collateral_pool, units)
            .ok_or(InsuranceError::ZeroSupply)?;
        let collateral = self.collateral_pool.checked_sub(amount).ok_or(InsuranceError::Overflow)?;
        let redeemed = self.total_redeemed.checked_add(amount).ok_or(InsuranceError::Overflow)?;

        self.total_supply -= units;
        self.collateral_pool = collateral;
        self.total_redeemed = redeemed;
        balance.units -= units;
        Ok(amount)
    }
}

impl PremiumSink for GlueToken {
    fn accept_premium(&mut self, _source: &[u8; 32], amount: u64) -> Result<bool, InsuranceError> {
        if amount == 0 {
            return Ok(false);
        }
        self.deposit(amount)?;
        Ok(true)
    }
}

// ═══════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════

/// Singleton registry config.
/// PDA seeds: [b"registry"]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct Registry {
    pub is_initialized: u8,
    pub bump: u8,
    pub _padding: [u8; 6],
    /// Only identity allowed to register vaults
    pub registrar: [u8; 32],
    pub entries: u64,
    pub _reserved: [u8; 32],
}

pub const REGISTRY_SIZE: usize = core::mem::size_of::<Registry>();

/// Write-once `(vault, pool)` pair.
/// PDA seeds: [b"registry_entry", vault]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct RegistryEntry {
    pub is_initialized: u8,
    pub bump: u8,
    pub _padding: [u8; 6],
    pub vault: [u8; 32],
    pub pool: [u8; 32],
    pub registered_at: i64,
    pub _reserved: [u8; 32],
}

pub const REGISTRY_ENTRY_SIZE: usize = core::mem::size_of::<RegistryEntry>();

impl Registry {
    pub fn register(
        &mut self,
        caller: &[u8; 32],
        entry: &mut RegistryEntry,
        vault: &[u8; 32],
        pool: &[u8; 32],
        bump: u8,
        now: i64,
    ) -> Result<(), InsuranceError> {
        if *caller != self.registrar {
            return Err(InsuranceError::Unauthorized);
        }
        if entry.is_initialized == 1 {
            return Err(InsuranceError::AlreadyRegistered);
        }
        let entries = self.entries.checked_add(1).ok_or(InsuranceError::Overflow)?;

        entry.is_initialized = 1;
        entry.bump = bump;
        entry.vault = *vault;
        entry.pool = *pool;
        entry.registered_at = now;
        self.entries = entries;
        Ok(())
    }
}

impl RegistryEntry {
    /// Pool registered for `vault`, if this entry describes it.
    pub fn lookup(&self, vault: &Pubkey) -> Option<Pubkey> {
        if self.is_initialized == 1 && self.vault == vault.to_bytes() {
            Some(Pubkey::new_from_array(self.pool))
        } else {
            None
        }
    }
}

/// Known sink kinds.
pub fn is_valid_sink_kind(kind: u8) -> bool {
    kind == SINK_INSURANCE_POOL || kind == SINK_GLUE
}

// ═══════════════════════════════════════════════════════════════
// PDA derivation
// ═══════════════════════════════════════════════════════════════

pub fn derive_fee_vault_pda(program_id: &Pubkey, vault_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[FEE_VAULT_SEED, vault_id.as_ref()], program_id)
}

/// Owner of the vault token account; also the identity that records premium.
pub fn derive_vault_authority(program_id: &Pubkey, fee_vault: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[VAULT_AUTH_SEED, fee_vault.as_ref()], program_id)
}

pub fn derive_vault_position_pda(program_id: &Pubkey, fee_vault: &Pubkey, owner: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[VAULT_POSITION_SEED, fee_vault.as_ref(), owner.as_ref()],
        program_id,
    )
}

pub fn derive_pool_pda(program_id: &Pubkey, strategy: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[POOL_SEED, strategy.as_ref()], program_id)
}

pub fn derive_pool_authority(program_id: &Pubkey, pool: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[POOL_AUTH_SEED, pool.as_ref()], program_id)
}

pub fn derive_stake_position_pda(program_id: &Pubkey, pool: &Pubkey, staker: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[STAKE_POSITION_SEED, pool.as_ref(), staker.as_ref()],
        program_id,
    )
}

pub fn derive_loss_record_pda(program_id: &Pubkey, pool: &Pubkey, epoch: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[LOSS_RECORD_SEED, pool.as_ref(), &epoch.to_le_bytes()],
        program_id,
    )
}

pub fn derive_glue_pda(program_id: &Pubkey, glue_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[GLUE_SEED, glue_id.as_ref()], program_id)
}

pub fn derive_glue_authority(program_id: &Pubkey, glue: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[GLUE_AUTH_SEED, glue.as_ref()], program_id)
}

pub fn derive_glue_balance_pda(program_id: &Pubkey, glue: &Pubkey, holder: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[GLUE_BALANCE_SEED, glue.as_ref(), holder.as_ref()],
        program_id,
    )
}

pub fn derive_registry_pda(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[REGISTRY_SEED], program_id)
}

pub fn derive_registry_entry_pda(program_id: &Pubkey, vault: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[REGISTRY_ENTRY_SEED, vault.as_ref()], program_id)
}
