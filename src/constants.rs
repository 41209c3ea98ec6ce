//! Protocol constants and initialization defaults.

/// Denominator for every basis-point rate.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// 365 days. Management fees accrue linearly over this period.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Fixed-point scale of strategy price-per-share.
pub const PPS_SCALE: u128 = 1_000_000_000_000_000_000;

/// Fixed-point scale of the premium-per-share accumulator.
pub const PREMIUM_INDEX_SCALE: u128 = 1_000_000_000_000_000_000;

/// Minimum spacing between two checkpoint updates (one day).
pub const MIN_CHECKPOINT_INTERVAL_SECS: u64 = 86_400;

/// Upper bound on any configured duration (ten years).
pub const MAX_DURATION_SECS: u64 = 10 * SECONDS_PER_YEAR;

// ── Defaults (used by clients building InitPool / InitVault) ──

pub const DEFAULT_DEDUCTIBLE_BPS: u64 = 1_000;
pub const DEFAULT_CHECKPOINT_MATURITY_SECS: u64 = 3_600;
pub const DEFAULT_CALLER_REWARD_BPS: u64 = 10;
pub const DEFAULT_COOLDOWN_SECS: u64 = 86_400;
pub const DEFAULT_MANAGEMENT_FEE_BPS: u64 = 200;
pub const DEFAULT_PERFORMANCE_FEE_BPS: u64 = 2_000;
pub const DEFAULT_INSURANCE_SPLIT_BPS: u64 = 5_000;

// ── Premium sinks ──

/// Fee vault forwards premium to an insurance pool (claimable balance).
pub const SINK_INSURANCE_POOL: u8 = 0;
/// Fee vault forwards premium to a glue token (appreciating collateral).
pub const SINK_GLUE: u8 = 1;

// ── PDA seeds ──

pub const FEE_VAULT_SEED: &[u8] = b"fee_vault";
pub const VAULT_AUTH_SEED: &[u8] = b"vault_auth";
pub const VAULT_POSITION_SEED: &[u8] = b"vault_position";
pub const POOL_SEED: &[u8] = b"insurance_pool";
pub const POOL_AUTH_SEED: &[u8] = b"pool_auth";
pub const STAKE_POSITION_SEED: &[u8] = b"stake_position";
pub const LOSS_RECORD_SEED: &[u8] = b"loss_record";
pub const GLUE_SEED: &[u8] = b"glue";
pub const GLUE_AUTH_SEED: &[u8] = b"glue_auth";
pub const GLUE_BALANCE_SEED: &[u8] = b"glue_balance";
pub const REGISTRY_SEED: &[u8] = b"registry";
pub const REGISTRY_ENTRY_SEED: &[u8] = b"registry_entry";
