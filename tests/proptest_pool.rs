//! Property-based tests (proptest) for the insurance pool state machine.
//!
//! Random sequences of stake / unstake / premium / checkpoint / loss calls
//! are replayed against `InsurancePool`; the pool invariants are checked
//! after every step, whether the call succeeded or not.

use bytemuck::Zeroable;
use proptest::prelude::*;
use vault_insurance::constants::{
    DEFAULT_CALLER_REWARD_BPS, DEFAULT_CHECKPOINT_MATURITY_SECS, DEFAULT_COOLDOWN_SECS,
    DEFAULT_DEDUCTIBLE_BPS, MIN_CHECKPOINT_INTERVAL_SECS,
};
use vault_insurance::state::{InsurancePool, PoolParameters, StakePosition};
use vault_insurance::strategy::StrategyTotals;

const T0: i64 = 1_700_000_000;
const SOURCE: [u8; 32] = [3; 32];
const POOL_KEY: [u8; 32] = [4; 32];
const STAKERS: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    Stake { who: usize, amount: u64 },
    Unstake { who: usize, frac_bps: u64 },
    Premium { amount: u64 },
    Checkpoint { dt: i64, assets: u64, supply: u64 },
    TriggerLoss { dt: i64, assets: u64, supply: u64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..STAKERS, 1u64..1_000_000_000).prop_map(|(who, amount)| Op::Stake { who, amount }),
        (0..STAKERS, 1u64..=10_000).prop_map(|(who, frac_bps)| Op::Unstake { who, frac_bps }),
        (0u64..1_000_000).prop_map(|amount| Op::Premium { amount }),
        (0i64..2 * 86_400, 1u64..2_000_000, 1u64..2_000_000)
            .prop_map(|(dt, assets, supply)| Op::Checkpoint { dt, assets, supply }),
        (0i64..2 * 86_400, 1u64..2_000_000, 1u64..2_000_000)
            .prop_map(|(dt, assets, supply)| Op::TriggerLoss { dt, assets, supply }),
    ]
}

fn new_pool(floor: u64) -> InsurancePool {
    let mut pool = InsurancePool::zeroed();
    pool.is_initialized = 1;
    pool.premium_source = SOURCE;
    pool.cooldown_secs = DEFAULT_COOLDOWN_SECS;
    pool.min_checkpoint_interval = MIN_CHECKPOINT_INTERVAL_SECS;
    pool.apply_parameters(PoolParameters {
        deductible_bps: DEFAULT_DEDUCTIBLE_BPS,
        min_liquidity_floor: floor,
        checkpoint_maturity_secs: DEFAULT_CHECKPOINT_MATURITY_SECS,
        caller_reward_bps: DEFAULT_CALLER_REWARD_BPS,
    })
    .unwrap();
    pool
}

/// `a_assets / a_shares <= b_assets / b_shares`, cross-multiplied.
fn ratio_le(a_assets: u64, a_shares: u64, b_assets: u64, b_shares: u64) -> bool {
    (a_assets as u128) * (b_shares as u128) <= (b_assets as u128) * (a_shares as u128)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn prop_pool_invariants_hold_over_any_sequence(
        floor in prop_oneof![Just(0u64), 1u64..5_000_000_000],
        ops in prop::collection::vec(op(), 1..40),
    ) {
        let mut pool = new_pool(floor);
        let mut positions: Vec<StakePosition> = (0..STAKERS)
            .map(|i| {
                let mut position = StakePosition::zeroed();
                position.open(&POOL_KEY, &[10 + i as u8; 32], 255, &pool);
                position
            })
            .collect();
        // Final accumulator of each closed epoch, indexed by epoch.
        let mut epoch_ends: Vec<u128> = Vec::new();
        let mut now = T0;
        let mut last_pps: Option<u128> = None;

        for op in ops {
            let before = pool;
            match op {
                Op::Stake { who, amount } => {
                    let end = epoch_ends.get(positions[who].epoch as usize).copied();
                    let _ = pool.stake(&mut positions[who], amount, end);
                }
                Op::Unstake { who, frac_bps } => {
                    let end = epoch_ends.get(positions[who].epoch as usize).copied();
                    let held = pool.effective_shares(&positions[who]);
                    let shares = ((held as u128) * frac_bps as u128 / 10_000) as u64;
                    let _ = pool.unstake(&mut positions[who], shares, now, last_pps, end);
                }
                Op::Premium { amount } => {
                    let _ = pool.record_premium(&SOURCE, amount);
                }
                Op::Checkpoint { dt, assets, supply } => {
                    now += dt;
                    let totals = StrategyTotals { total_assets: assets, total_supply: supply };
                    last_pps = totals.price_per_share().ok();
                    let result = pool.update_checkpoint(now, totals);
                    prop_assert!(pool.checkpoint() >= before.checkpoint());
                    if result.is_err() {
                        prop_assert_eq!(bytemuck::bytes_of(&pool), bytemuck::bytes_of(&before));
                    }
                }
                Op::TriggerLoss { dt, assets, supply } => {
                    now += dt;
                    let totals = StrategyTotals { total_assets: assets, total_supply: supply };
                    last_pps = totals.price_per_share().ok();
                    match pool.trigger_loss(now, totals) {
                        Ok(loss) => {
                            prop_assert_eq!(loss.payout, before.pool_assets);
                            prop_assert_eq!(loss.net + loss.caller_reward, loss.payout);
                            prop_assert_eq!(pool.pool_assets, 0);
                            prop_assert_eq!(pool.total_stake_shares, 0);
                            prop_assert_eq!(epoch_ends.len() as u64, loss.epoch);
                            epoch_ends.push(loss.final_premium_index);
                        }
                        Err(_) => {
                            prop_assert_eq!(bytemuck::bytes_of(&pool), bytemuck::bytes_of(&before));
                        }
                    }
                }
            }

            // Share value never drops through stake / unstake / premium.
            if pool.loss_epoch == before.loss_epoch
                && before.total_stake_shares > 0
                && pool.total_stake_shares > 0
            {
                prop_assert!(ratio_le(
                    before.pool_assets,
                    before.total_stake_shares,
                    pool.pool_assets,
                    pool.total_stake_shares,
                ));
            }
            // Orphaned capital is impossible.
            prop_assert_eq!(pool.pool_assets == 0, pool.total_stake_shares == 0);
            // Live shares always add up.
            let live: u64 = positions.iter().map(|p| pool.effective_shares(p)).sum();
            prop_assert_eq!(live, pool.total_stake_shares);
            // A loss that cannot be paid never freezes capital.
            if let Some(pps) = last_pps {
                if pool.pool_assets < pool.min_liquidity_floor {
                    prop_assert_eq!(pool.available_capital(now, Some(pps)), pool.pool_assets);
                }
            }
        }
    }
}
