//! Pure share, fee and premium math, extracted for Kani formal verification.
//!
//! No Solana/Pubkey dependencies. Just arithmetic.
//! Every division rounds DOWN, which always favors the pool / vault over the
//! individual caller.

use crate::constants::{BPS_DENOMINATOR, PPS_SCALE, PREMIUM_INDEX_SCALE, SECONDS_PER_YEAR};

fn to_u64(v: u128) -> Option<u64> {
    if v > u64::MAX as u128 {
        None
    } else {
        Some(v as u64)
    }
}

/// Calculate shares to mint for a deposit into a proportional pool.
///
/// Used by the fee vault (vault shares), the insurance pool (stake shares)
/// and the glue token (collateral units).
///
/// # Returns
/// * `Some(shares)` - shares to mint (rounds DOWN, pool-favoring)
/// * `None` - arithmetic overflow, or a blocked state (see below)
///
/// # Invariant
/// First depositor (supply == 0 and value == 0): gets 1:1 shares.
/// Subsequent: `shares = amount * supply / value` (pro-rata, rounded down).
pub fn shares_for_deposit(total_shares: u64, total_value: u64, amount: u64) -> Option<u64> {
    if total_shares == 0 && total_value == 0 {
        Some(amount)
    } else if total_shares == 0 {
        // Orphaned value with no holders: a 1:1 deposit would capture all of it.
        None
    } else if total_value == 0 {
        // Holders exist but hold nothing: any ratio dilutes their future claim.
        None
    } else {
        let shares = (amount as u128)
            .checked_mul(total_shares as u128)?
            .checked_div(total_value as u128)?;
        to_u64(shares)
    }
}

/// Calculate assets owed for burning `shares`.
///
/// # Returns
/// * `Some(assets)` - `shares * value / supply` (rounds DOWN)
/// * `None` - zero supply or overflow
pub fn assets_for_shares(total_shares: u64, total_value: u64, shares: u64) -> Option<u64> {
    if total_shares == 0 {
        return None;
    }
    let assets = (shares as u128)
        .checked_mul(total_value as u128)?
        .checked_div(total_shares as u128)?;
    to_u64(assets)
}

/// `amount * bps / 10_000`, rounded down.
pub fn bps_of(amount: u64, bps: u64) -> Option<u64> {
    let v = (amount as u128)
        .checked_mul(bps as u128)?
        .checked_div(BPS_DENOMINATOR as u128)?;
    to_u64(v)
}

/// Time-based management fee:
/// `total_assets * rate_bps * elapsed / (SECONDS_PER_YEAR * 10_000)`.
pub fn management_fee(total_assets: u64, annual_rate_bps: u64, elapsed_secs: u64) -> Option<u64> {
    let numerator = (total_assets as u128)
        .checked_mul(annual_rate_bps as u128)?
        .checked_mul(elapsed_secs as u128)?;
    let denominator = (SECONDS_PER_YEAR as u128).checked_mul(BPS_DENOMINATOR as u128)?;
    to_u64(numerator / denominator)
}

/// Gain-based performance fee: `gain * rate_bps / 10_000`.
pub fn performance_fee(gain: u64, rate_bps: u64) -> Option<u64> {
    bps_of(gain, rate_bps)
}

/// Split a fee into `(treasury, insurance)`.
///
/// The insurance share rounds down; the treasury gets the remainder, so the
/// two parts always sum to `fee`.
pub fn split_fee(fee: u64, insurance_split_bps: u64) -> Option<(u64, u64)> {
    let insurance = bps_of(fee, insurance_split_bps)?;
    let treasury = fee.checked_sub(insurance)?;
    Some((treasury, insurance))
}

/// Price-per-share scaled by `PPS_SCALE`. `None` when supply is zero.
pub fn price_per_share(total_assets: u64, total_supply: u64) -> Option<u128> {
    if total_supply == 0 {
        return None;
    }
    (total_assets as u128)
        .checked_mul(PPS_SCALE)?
        .checked_div(total_supply as u128)
}

/// Highest PPS at which a loss is payable:
/// `checkpoint * (10_000 - deductible_bps) / 10_000`.
pub fn loss_threshold(checkpoint_pps: u128, deductible_bps: u64) -> Option<u128> {
    let keep = (BPS_DENOMINATOR).checked_sub(deductible_bps)? as u128;
    checkpoint_pps
        .checked_mul(keep)?
        .checked_div(BPS_DENOMINATOR as u128)
}

/// True if `current_pps` has fallen to or below the deductible threshold.
pub fn loss_exceeds_deductible(checkpoint_pps: u128, current_pps: u128, deductible_bps: u64) -> bool {
    match loss_threshold(checkpoint_pps, deductible_bps) {
        Some(threshold) => current_pps <= threshold,
        None => false,
    }
}

/// Split a payout into `(net_to_vault, caller_reward)`.
pub fn split_payout(payout: u64, caller_reward_bps: u64) -> Option<(u64, u64)> {
    let reward = bps_of(payout, caller_reward_bps)?;
    let net = payout.checked_sub(reward)?;
    Some((net, reward))
}

/// Accumulator increment for a premium of `amount` spread over `total_shares`.
/// `None` when there are no shares to credit.
pub fn premium_index_delta(amount: u64, total_shares: u64) -> Option<u128> {
    if total_shares == 0 {
        return None;
    }
    (amount as u128)
        .checked_mul(PREMIUM_INDEX_SCALE)?
        .checked_div(total_shares as u128)
}

/// Premium earned by `shares` between `snapshot` and `index`.
pub fn premium_earned(shares: u64, index: u128, snapshot: u128) -> Option<u64> {
    let delta = index.checked_sub(snapshot)?;
    let earned = (shares as u128).checked_mul(delta)? / PREMIUM_INDEX_SCALE;
    to_u64(earned)
}

/// Redemption value of one glue unit, scaled by `PPS_SCALE`.
pub fn redemption_value_per_unit(collateral_pool: u64, total_supply: u64) -> Option<u128> {
    price_per_share(collateral_pool, total_supply)
}

/// Glue units to mint for `amount` of collateral.
///
/// Unlike `shares_for_deposit`, collateral donated before the first mint is
/// not blocked: the first minter gets `amount` units and the donated
/// collateral backs them.
pub fn glue_units_for_mint(total_supply: u64, collateral_pool: u64, amount: u64) -> Option<u64> {
    if total_supply == 0 {
        return Some(amount);
    }
    if collateral_pool == 0 {
        return None;
    }
    let units = (amount as u128)
        .checked_mul(total_supply as u128)?
        .checked_div(collateral_pool as u128)?;
    to_u64(units)
}
