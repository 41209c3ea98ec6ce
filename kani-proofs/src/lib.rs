//! Kani formal verification for vault-insurance math.
//!
//! ZERO dependencies. Pure Rust. CBMC-friendly.
//!
//! Functions use u32 inputs / u64 intermediates. The production code uses
//! u64/u128, but the arithmetic properties (conservation, monotonicity,
//! bounds) are scale-invariant. u32 keeps SAT formulas tractable for CBMC.
//! The premium accumulator scale is shrunk from 1e18 to 1e6 for the same reason.
//!
//! Run all:   cargo kani --lib
//! Run one:   cargo kani --harness proof_first_depositor_exact

pub const BPS: u64 = 10_000;
pub const INDEX_SCALE: u64 = 1_000_000;

// ═══════════════════════════════════════════════════════════════
// Narrow mirrors of src/math.rs
// Arithmetic is IDENTICAL, just narrower types for CBMC tractability.
// ═══════════════════════════════════════════════════════════════

/// Shares for a deposit. Empty pool: 1:1. Orphaned state: blocked.
pub fn shares_for_deposit(supply: u32, value: u32, amount: u32) -> Option<u32> {
    if supply == 0 && value == 0 {
        Some(amount)
    } else if supply == 0 || value == 0 {
        None
    } else {
        let s = (amount as u64)
            .checked_mul(supply as u64)?
            .checked_div(value as u64)?;
        u32::try_from(s).ok()
    }
}

/// Assets for burning shares. floor(shares * value / supply).
pub fn assets_for_shares(supply: u32, value: u32, shares: u32) -> Option<u32> {
    if supply == 0 {
        return None;
    }
    let a = (shares as u64)
        .checked_mul(value as u64)?
        .checked_div(supply as u64)?;
    u32::try_from(a).ok()
}

/// (treasury, insurance). Insurance rounds down.
pub fn split_fee(fee: u32, split_bps: u32) -> Option<(u32, u32)> {
    let insurance = (fee as u64).checked_mul(split_bps as u64)? / BPS;
    let insurance = u32::try_from(insurance).ok()?;
    Some((fee.checked_sub(insurance)?, insurance))
}

/// (net, caller_reward). Reward rounds down.
pub fn split_payout(payout: u32, reward_bps: u32) -> Option<(u32, u32)> {
    let reward = (payout as u64).checked_mul(reward_bps as u64)? / BPS;
    let reward = u32::try_from(reward).ok()?;
    Some((payout.checked_sub(reward)?, reward))
}

pub fn premium_index_delta(amount: u32, total_shares: u32) -> Option<u64> {
    if total_shares == 0 {
        return None;
    }
    (amount as u64).checked_mul(INDEX_SCALE)?.checked_div(total_shares as u64)
}

pub fn premium_earned(shares: u32, index: u64, snapshot: u64) -> Option<u32> {
    let delta = index.checked_sub(snapshot)?;
    let earned = (shares as u64).checked_mul(delta)? / INDEX_SCALE;
    u32::try_from(earned).ok()
}

/// Glue units. First mint gets `amount` even over donated collateral.
pub fn glue_units_for_mint(supply: u32, collateral: u32, amount: u32) -> Option<u32> {
    if supply == 0 {
        return Some(amount);
    }
    if collateral == 0 {
        return None;
    }
    let u = (amount as u64)
        .checked_mul(supply as u64)?
        .checked_div(collateral as u64)?;
    u32::try_from(u).ok()
}

/// True if `current` is at or below `checkpoint * (1 - deductible)`.
pub fn loss_exceeds_deductible(checkpoint: u32, current: u32, deductible_bps: u32) -> bool {
    match BPS.checked_sub(deductible_bps as u64) {
        Some(keep) => (current as u64) <= (checkpoint as u64) * keep / BPS,
        None => false,
    }
}

// ═══════════════════════════════════════════════════════════════
// KANI PROOFS
// ═══════════════════════════════════════════════════════════════

#[cfg(kani)]
mod proofs {
    use super::*;

    // ── 1. Conservation ──

    /// Deposit→withdraw roundtrip: can't get back more than deposited.
    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_deposit_withdraw_no_inflation() {
        let supply: u32 = kani::any();
        let value: u32 = kani::any();
        let deposit: u32 = kani::any();
        kani::assume(deposit > 0 && deposit < 20);
        kani::assume(supply > 0 && supply < 20);
        kani::assume(value > 0 && value < 20);

        let shares = match shares_for_deposit(supply, value, deposit) {
            Some(s) if s > 0 => s,
            _ => return,
        };
        let back = assets_for_shares(supply + shares, value + deposit, shares).unwrap();
        assert!(back <= deposit);
    }

    /// First depositor: exact 1:1 roundtrip.
    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_first_depositor_exact() {
        let amount: u32 = kani::any();
        kani::assume(amount > 0 && amount < 100);

        let shares = shares_for_deposit(0, 0, amount).unwrap();
        assert_eq!(shares, amount);
        assert_eq!(assets_for_shares(shares, amount, shares).unwrap(), amount);
    }

    /// Two stakers both exit: total_out ≤ total_in.
    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_two_stakers_conservation() {
        let a: u32 = kani::any();
        let b: u32 = kani::any();
        kani::assume(a > 0 && a < 100);
        kani::assume(b > 0 && b < 100);

        let a_shares = shares_for_deposit(0, 0, a).unwrap();
        let b_shares = match shares_for_deposit(a_shares, a, b) {
            Some(s) if s > 0 => s,
            _ => return,
        };
        let supply = a_shares + b_shares;
        let value = a + b;

        let a_back = assets_for_shares(supply, value, a_shares).unwrap();
        let b_back = assets_for_shares(supply - a_shares, value - a_back, b_shares).unwrap();
        assert!((a_back as u64) + (b_back as u64) <= (a as u64) + (b as u64));
    }

    /// Orphaned value or valueless shares always block a deposit.
    #[kani::proof]
    fn proof_orphaned_state_blocked() {
        let x: u32 = kani::any();
        let amount: u32 = kani::any();
        kani::assume(x > 0);
        assert!(shares_for_deposit(0, x, amount).is_none());
        assert!(shares_for_deposit(x, 0, amount).is_none());
    }

    /// Full burn returns at most the pool value.
    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_full_burn_bounded() {
        let supply: u32 = kani::any();
        let value: u32 = kani::any();
        kani::assume(supply > 0);
        assert!(assets_for_shares(supply, value, supply).unwrap() <= value);
    }

    // ── 2. Arithmetic safety ──

    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_shares_for_deposit_no_panic() {
        let _ = shares_for_deposit(kani::any(), kani::any(), kani::any());
    }

    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_assets_for_shares_no_panic() {
        let _ = assets_for_shares(kani::any(), kani::any(), kani::any());
    }

    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_glue_units_no_panic() {
        let _ = glue_units_for_mint(kani::any(), kani::any(), kani::any());
    }

    // ── 3. Splits ──

    /// treasury + insurance == fee.
    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_fee_split_conserves() {
        let fee: u32 = kani::any();
        let split: u32 = kani::any();
        kani::assume(split <= 10_000);
        let (treasury, insurance) = split_fee(fee, split).unwrap();
        assert_eq!(treasury as u64 + insurance as u64, fee as u64);
    }

    /// net + reward == payout.
    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_payout_split_conserves() {
        let payout: u32 = kani::any();
        let bps: u32 = kani::any();
        kani::assume(bps <= 10_000);
        let (net, reward) = split_payout(payout, bps).unwrap();
        assert_eq!(net as u64 + reward as u64, payout as u64);
    }

    /// Split above 100% is rejected rather than underflowing.
    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_split_over_100_percent_rejected() {
        let fee: u32 = kani::any();
        let split: u32 = kani::any();
        kani::assume(fee > 0 && fee < 1_000);
        kani::assume(split > 10_000 && split < 20_000);
        kani::assume((fee as u64) * (split as u64) / BPS > fee as u64);
        assert!(split_fee(fee, split).is_none());
    }

    // ── 4. Premium ──

    /// Two stakers never receive more than the recorded premium.
    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_premium_not_over_distributed() {
        let a: u32 = kani::any();
        let b: u32 = kani::any();
        let premium: u32 = kani::any();
        kani::assume(a > 0 && a < 50);
        kani::assume(b > 0 && b < 50);
        kani::assume(premium < 1_000);

        let delta = premium_index_delta(premium, a + b).unwrap();
        let paid = premium_earned(a, delta, 0).unwrap() as u64 + premium_earned(b, delta, 0).unwrap() as u64;
        assert!(paid <= premium as u64);
    }

    /// Two recordings pay at least as much as either alone.
    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_premium_monotonic() {
        let shares: u32 = kani::any();
        let p1: u32 = kani::any();
        let p2: u32 = kani::any();
        kani::assume(shares > 0 && shares < 50);
        kani::assume(p1 < 500 && p2 < 500);

        let i1 = premium_index_delta(p1, shares).unwrap();
        let i2 = i1 + premium_index_delta(p2, shares).unwrap();
        assert!(premium_earned(shares, i2, 0).unwrap() >= premium_earned(shares, i1, 0).unwrap());
    }

    /// A snapshot ahead of the index is an error, never a wrap-around.
    #[kani::proof]
    fn proof_premium_backwards_rejected() {
        let index: u64 = kani::any();
        let snapshot: u64 = kani::any();
        kani::assume(snapshot > index);
        assert!(premium_earned(kani::any(), index, snapshot).is_none());
    }

    // ── 5. Loss detection ──

    /// Rising PPS never pays out.
    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_no_payout_on_rise() {
        let checkpoint: u32 = kani::any();
        let current: u32 = kani::any();
        let deductible: u32 = kani::any();
        kani::assume(current > checkpoint);
        assert!(!loss_exceeds_deductible(checkpoint, current, deductible));
    }

    /// A larger deductible never makes a loss easier to trigger.
    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_deductible_monotonic() {
        let checkpoint: u32 = kani::any();
        let current: u32 = kani::any();
        let d1: u32 = kani::any();
        let d2: u32 = kani::any();
        kani::assume(d1 <= d2 && d2 <= 10_000);
        if loss_exceeds_deductible(checkpoint, current, d2) {
            assert!(loss_exceeds_deductible(checkpoint, current, d1));
        }
    }

    // ── 6. Glue ──

    /// Mint then redeem never inflates.
    #[kani::proof]
    #[kani::unwind(33)]
    fn proof_glue_mint_redeem_no_inflation() {
        let supply: u32 = kani::any();
        let collateral: u32 = kani::any();
        let amount: u32 = kani::any();
        kani::assume(supply > 0 && supply < 50);
        kani::assume(collateral > 0 && collateral < 50);
        kani::assume(amount > 0 && amount < 50);

        let units = glue_units_for_mint(supply, collateral, amount).unwrap();
        kani::assume(units > 0);
        let back = assets_for_shares(supply + units, collateral + amount, units).unwrap();
        assert!(back <= amount);
    }

    /// First mint is 1:1 regardless of donated collateral.
    #[kani::proof]
    fn proof_glue_first_mint_one_to_one() {
        let collateral: u32 = kani::any();
        let amount: u32 = kani::any();
        assert_eq!(glue_units_for_mint(0, collateral, amount), Some(amount));
    }
}
