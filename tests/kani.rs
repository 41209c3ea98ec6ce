//! Kani formal verification proofs for vault-insurance math.
//!
//! Proves critical safety properties on the PURE MATH layer:
//! 1. Share conservation: no value creation through deposit/withdraw
//! 2. Fee and payout splits: parts always sum to the whole
//! 3. Premium accumulator: never distributes more than recorded
//! 4. Loss detection: threshold is consistent with the deductible
//!
//! Run all:  cargo kani --tests
//! Run one:  cargo kani --harness <name>

#[cfg(kani)]
mod kani_proofs {
    use vault_insurance::math::{
        assets_for_shares, glue_units_for_mint, loss_exceeds_deductible, loss_threshold,
        premium_earned, premium_index_delta, shares_for_deposit, split_fee, split_payout,
    };

    // ═══════════════════════════════════════════════════════════
    // 1. Share conservation
    // ═══════════════════════════════════════════════════════════

    /// PROOF: Deposit then immediate withdraw of the minted shares returns
    /// at most the deposited amount.
    #[kani::proof]
    fn proof_deposit_withdraw_no_inflation() {
        let supply: u64 = kani::any();
        let value: u64 = kani::any();
        let deposit: u64 = kani::any();

        kani::assume(supply > 0 && supply <= 1_000_000_000);
        kani::assume(value > 0 && value <= 1_000_000_000);
        kani::assume(deposit > 0 && deposit <= 1_000_000_000);

        let shares = match shares_for_deposit(supply, value, deposit) {
            Some(s) if s > 0 => s,
            _ => return,
        };
        let back = match assets_for_shares(supply + shares, value + deposit, shares) {
            Some(v) => v,
            None => return,
        };
        assert!(back <= deposit);
    }

    /// PROOF: Orphaned value or valueless shares block deposits.
    #[kani::proof]
    fn proof_orphaned_state_blocks_deposit() {
        let x: u64 = kani::any();
        let amount: u64 = kani::any();
        kani::assume(x > 0);
        assert!(shares_for_deposit(0, x, amount).is_none());
        assert!(shares_for_deposit(x, 0, amount).is_none());
    }

    /// PROOF: Burning shares never pays more than the pool holds.
    #[kani::proof]
    fn proof_withdraw_bounded_by_value() {
        let supply: u64 = kani::any();
        let value: u64 = kani::any();
        let burn: u64 = kani::any();
        kani::assume(supply > 0);
        kani::assume(burn <= supply);

        let out = assets_for_shares(supply, value, burn).unwrap();
        assert!(out <= value);
    }

    /// PROOF: Glue mint then redeem never inflates.
    #[kani::proof]
    fn proof_glue_mint_redeem_no_inflation() {
        let supply: u64 = kani::any();
        let collateral: u64 = kani::any();
        let amount: u64 = kani::any();
        kani::assume(supply > 0 && supply <= 1_000_000);
        kani::assume(collateral > 0 && collateral <= 1_000_000);
        kani::assume(amount > 0 && amount <= 1_000_000);

        let units = glue_units_for_mint(supply, collateral, amount).unwrap();
        kani::assume(units > 0);
        let back = assets_for_shares(supply + units, collateral + amount, units).unwrap();
        assert!(back <= amount);
    }

    // ═══════════════════════════════════════════════════════════
    // 2. Splits
    // ═══════════════════════════════════════════════════════════

    /// PROOF: Treasury + insurance == fee for every valid split.
    #[kani::proof]
    fn proof_fee_split_conserves() {
        let fee: u64 = kani::any();
        let split: u64 = kani::any();
        kani::assume(split <= 10_000);

        let (treasury, insurance) = split_fee(fee, split).unwrap();
        assert!(treasury as u128 + insurance as u128 == fee as u128);
    }

    /// PROOF: Net payout + caller reward == payout.
    #[kani::proof]
    fn proof_payout_split_conserves() {
        let payout: u64 = kani::any();
        let reward_bps: u64 = kani::any();
        kani::assume(reward_bps <= 10_000);

        let (net, reward) = split_payout(payout, reward_bps).unwrap();
        assert!(net as u128 + reward as u128 == payout as u128);
        assert!(reward <= payout);
    }

    // ═══════════════════════════════════════════════════════════
    // 3. Premium accumulator
    // ═══════════════════════════════════════════════════════════

    /// PROOF: Two stakers never receive more than the recorded premium.
    #[kani::proof]
    fn proof_premium_not_over_distributed() {
        let a: u64 = kani::any();
        let b: u64 = kani::any();
        let premium: u64 = kani::any();
        kani::assume(a > 0 && a <= 1_000_000);
        kani::assume(b > 0 && b <= 1_000_000);
        kani::assume(premium <= 1_000_000);

        let delta = premium_index_delta(premium, a + b).unwrap();
        let paid_a = premium_earned(a, delta, 0).unwrap();
        let paid_b = premium_earned(b, delta, 0).unwrap();
        assert!(paid_a + paid_b <= premium);
    }

    /// PROOF: No shares, no accumulator update.
    #[kani::proof]
    fn proof_premium_delta_requires_shares() {
        let amount: u64 = kani::any();
        assert!(premium_index_delta(amount, 0).is_none());
    }

    // ═══════════════════════════════════════════════════════════
    // 4. Loss detection
    // ═══════════════════════════════════════════════════════════

    /// PROOF: Threshold never exceeds the checkpoint and is itself payable.
    #[kani::proof]
    fn proof_threshold_consistent() {
        let checkpoint: u64 = kani::any();
        let deductible: u64 = kani::any();
        kani::assume(deductible <= 10_000);

        let cp = checkpoint as u128;
        let threshold = loss_threshold(cp, deductible).unwrap();
        assert!(threshold <= cp);
        assert!(loss_exceeds_deductible(cp, threshold, deductible));
        assert!(!loss_exceeds_deductible(cp, threshold + 1, deductible));
    }

    /// PROOF: PPS above the checkpoint never pays out.
    #[kani::proof]
    fn proof_no_payout_on_rise() {
        let checkpoint: u64 = kani::any();
        let current: u64 = kani::any();
        let deductible: u64 = kani::any();
        kani::assume(deductible <= 10_000);
        kani::assume(current > checkpoint);

        assert!(!loss_exceeds_deductible(checkpoint as u128, current as u128, deductible));
    }
}
