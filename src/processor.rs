use bytemuck::Pod;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    sysvar::{clock::Clock, Sysvar},
};

use crate::constants::{
    FEE_VAULT_SEED, GLUE_AUTH_SEED, GLUE_BALANCE_SEED, GLUE_SEED, LOSS_RECORD_SEED,
    POOL_AUTH_SEED, POOL_SEED, REGISTRY_ENTRY_SEED, REGISTRY_SEED,
    SINK_GLUE, SINK_INSURANCE_POOL, STAKE_POSITION_SEED, VAULT_AUTH_SEED, VAULT_POSITION_SEED,
};
use crate::cpi::{self, verify_token_program};
use crate::error::InsuranceError;
use crate::instruction::InsuranceInstruction;
use crate::state::{
    self, FeeConfig, FeeVault, GlueBalance, GlueToken, InsurancePool, LossRecord, PoolParameters,
    PremiumSink, Registry, RegistryEntry, StakePosition, VaultPosition, FEE_VAULT_SIZE,
    GLUE_BALANCE_SIZE, GLUE_TOKEN_SIZE, INSURANCE_POOL_SIZE, LOSS_RECORD_SIZE, REGISTRY_ENTRY_SIZE,
    REGISTRY_SIZE, STAKE_POSITION_SIZE, VAULT_POSITION_SIZE,
};
use crate::strategy::load_strategy;

pub fn process(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = InsuranceInstruction::unpack(instruction_data)?;

    match instruction {
        InsuranceInstruction::InitVault {
            management_fee_bps,
            performance_fee_bps,
            insurance_split_bps,
            sink_kind,
        } => process_init_vault(
            program_id,
            accounts,
            FeeConfig {
                management_fee_bps: management_fee_bps as u64,
                performance_fee_bps: performance_fee_bps as u64,
                insurance_split_bps: insurance_split_bps as u64,
            },
            sink_kind,
        ),
        InsuranceInstruction::Deposit { amount } => process_deposit(program_id, accounts, amount),
        InsuranceInstruction::Withdraw { shares } => process_withdraw(program_id, accounts, shares),
        InsuranceInstruction::AccrueFees => process_accrue_fees(program_id, accounts),
        InsuranceInstruction::Report { gain, loss } => process_report(program_id, accounts, gain, loss),
        InsuranceInstruction::UpdateVaultConfig {
            management_fee_bps,
            performance_fee_bps,
            insurance_split_bps,
        } => process_update_vault_config(
            program_id,
            accounts,
            management_fee_bps.map(u64::from),
            performance_fee_bps.map(u64::from),
            insurance_split_bps.map(u64::from),
        ),
        InsuranceInstruction::InitPool {
            deductible_bps,
            min_liquidity_floor,
            checkpoint_maturity_secs,
            caller_reward_bps,
            cooldown_secs,
            min_checkpoint_interval,
        } => process_init_pool(
            program_id,
            accounts,
            PoolParameters {
                deductible_bps: deductible_bps as u64,
                min_liquidity_floor,
                checkpoint_maturity_secs,
                caller_reward_bps: caller_reward_bps as u64,
            },
            cooldown_secs,
            min_checkpoint_interval,
        ),
        InsuranceInstruction::Stake { amount } => process_stake(program_id, accounts, amount),
        InsuranceInstruction::Unstake { shares } => process_unstake(program_id, accounts, shares),
        InsuranceInstruction::RecordPremium { amount } => {
            process_record_premium(program_id, accounts, amount)
        }
        InsuranceInstruction::Claim => process_claim(program_id, accounts),
        InsuranceInstruction::UpdateCheckpoint => process_update_checkpoint(program_id, accounts),
        InsuranceInstruction::TriggerLoss => process_trigger_loss(program_id, accounts),
        InsuranceInstruction::SetParameters {
            deductible_bps,
            min_liquidity_floor,
            checkpoint_maturity_secs,
            caller_reward_bps,
        } => process_set_parameters(
            program_id,
            accounts,
            PoolParameters {
                deductible_bps: deductible_bps as u64,
                min_liquidity_floor,
                checkpoint_maturity_secs,
                caller_reward_bps: caller_reward_bps as u64,
            },
        ),
        InsuranceInstruction::InitGlue => process_init_glue(program_id, accounts),
        InsuranceInstruction::GlueDeposit { amount } => {
            process_glue_deposit(program_id, accounts, amount)
        }
        InsuranceInstruction::GlueMint { amount } => process_glue_mint(program_id, accounts, amount),
        InsuranceInstruction::GlueRedeem { units } => process_glue_redeem(program_id, accounts, units),
        InsuranceInstruction::InitRegistry => process_init_registry(program_id, accounts),
        InsuranceInstruction::RegisterVault => process_register_vault(program_id, accounts),
    }
}

// ═══════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════

fn load<T: Pod>(data: &[u8]) -> Result<&T, ProgramError> {
    if data.len() != core::mem::size_of::<T>() {
        return Err(ProgramError::InvalidAccountData);
    }
    bytemuck::try_from_bytes(data).map_err(|_| ProgramError::InvalidAccountData)
}

fn load_mut<T: Pod>(data: &mut [u8]) -> Result<&mut T, ProgramError> {
    if data.len() != core::mem::size_of::<T>() {
        return Err(ProgramError::InvalidAccountData);
    }
    bytemuck::try_from_bytes_mut(data).map_err(|_| ProgramError::InvalidAccountData)
}

fn check_owner(program_id: &Pubkey, account: &AccountInfo) -> ProgramResult {
    if account.owner != program_id {
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

fn check_signer(account: &AccountInfo) -> ProgramResult {
    if !account.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    Ok(())
}

fn check_key(account: &AccountInfo, expected: &[u8; 32]) -> ProgramResult {
    if account.key.to_bytes() != *expected {
        return Err(InsuranceError::InvalidPda.into());
    }
    Ok(())
}

fn unix_now(clock_sysvar: &AccountInfo) -> Result<i64, ProgramError> {
    Ok(Clock::from_account_info(clock_sysvar)?.unix_timestamp)
}

/// Run `f` against the vault's premium sink, loaded by kind.
fn with_premium_sink<R>(
    program_id: &Pubkey,
    sink_kind: u8,
    sink: &AccountInfo,
    f: impl FnOnce(&mut dyn PremiumSink) -> Result<R, InsuranceError>,
) -> Result<R, ProgramError> {
    check_owner(program_id, sink)?;
    let mut data = sink.try_borrow_mut_data()?;
    match sink_kind {
        SINK_INSURANCE_POOL => {
            let pool: &mut InsurancePool = load_mut(&mut data[..])?;
            if pool.is_initialized != 1 {
                return Err(InsuranceError::NotInitialized.into());
            }
            Ok(f(pool)?)
        }
        SINK_GLUE => {
            let glue: &mut GlueToken = load_mut(&mut data[..])?;
            if glue.is_initialized != 1 {
                return Err(InsuranceError::NotInitialized.into());
            }
            Ok(f(glue)?)
        }
        _ => Err(InsuranceError::InvalidParameter.into()),
    }
}

/// Check a sink before a vault is bound to it.
fn verify_premium_sink(
    program_id: &Pubkey,
    sink_kind: u8,
    sink: &AccountInfo,
    sink_token: &AccountInfo,
    asset_mint: &[u8; 32],
    vault_authority: &Pubkey,
) -> ProgramResult {
    check_owner(program_id, sink)?;
    let data = sink.try_borrow_data()?;
    match sink_kind {
        SINK_INSURANCE_POOL => {
            let pool: &InsurancePool = load(&data[..])?;
            if pool.is_initialized != 1 {
                return Err(InsuranceError::NotInitialized.into());
            }
            if pool.asset_mint != *asset_mint {
                return Err(InsuranceError::InvalidMint.into());
            }
            check_key(sink_token, &pool.pool_token)?;
            // Otherwise every routed premium would be rejected.
            if pool.premium_source != vault_authority.to_bytes() {
                return Err(InsuranceError::NotPremiumSource.into());
            }
        }
        SINK_GLUE => {
            let glue: &GlueToken = load(&data[..])?;
            if glue.is_initialized != 1 {
                return Err(InsuranceError::NotInitialized.into());
            }
            if glue.asset_mint != *asset_mint {
                return Err(InsuranceError::InvalidMint.into());
            }
            check_key(sink_token, &glue.collateral_token)?;
        }
        _ => return Err(InsuranceError::InvalidParameter.into()),
    }
    Ok(())
}

/// Accounts every fee-routing instruction must pass.
fn check_fee_route(
    vault: &FeeVault,
    vault_token: &AccountInfo,
    treasury_token: &AccountInfo,
    premium_sink: &AccountInfo,
    sink_token: &AccountInfo,
) -> ProgramResult {
    check_key(vault_token, &vault.vault_token)?;
    check_key(treasury_token, &vault.treasury_token)?;
    check_key(premium_sink, &vault.premium_sink)?;
    check_key(sink_token, &vault.sink_token)
}

/// Final accumulator of the epoch a stale position belongs to.
///
/// `None` when the position is current, empty, or no record was passed;
/// the pool then rejects a stale position that still holds shares.
fn epoch_end_index(
    program_id: &Pubkey,
    pool_key: &Pubkey,
    pool: &InsurancePool,
    position: &StakePosition,
    record: Option<&AccountInfo>,
) -> Result<Option<u128>, ProgramError> {
    if position.epoch == pool.loss_epoch || position.stake_shares == 0 {
        return Ok(None);
    }
    let Some(record) = record else {
        return Ok(None);
    };
    let (expected, _) = state::derive_loss_record_pda(program_id, pool_key, position.epoch);
    if *record.key != expected {
        return Err(InsuranceError::InvalidPda.into());
    }
    check_owner(program_id, record)?;
    let data = record.try_borrow_data()?;
    let loss: &LossRecord = load(&data[..])?;
    if loss.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    Ok(Some(loss.final_index()))
}

fn load_position<'d>(
    data: &'d mut [u8],
    pool_key: &Pubkey,
    staker: &Pubkey,
) -> Result<&'d mut StakePosition, ProgramError> {
    let position: &mut StakePosition = load_mut(data)?;
    if position.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    if position.staker != staker.to_bytes() || position.pool != pool_key.to_bytes() {
        return Err(InsuranceError::Unauthorized.into());
    }
    Ok(position)
}

// ═══════════════════════════════════════════════════════════════
// 0: InitVault
// ═══════════════════════════════════════════════════════════════

fn process_init_vault(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    config: FeeConfig,
    sink_kind: u8,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let admin = next_account_info(accounts_iter)?;
    let vault_id = next_account_info(accounts_iter)?;
    let vault_pda = next_account_info(accounts_iter)?;
    let vault_token = next_account_info(accounts_iter)?;
    let vault_auth = next_account_info(accounts_iter)?;
    let asset_mint = next_account_info(accounts_iter)?;
    let keeper = next_account_info(accounts_iter)?;
    let treasury_token = next_account_info(accounts_iter)?;
    let premium_sink = next_account_info(accounts_iter)?;
    let sink_token = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;
    let rent_sysvar = next_account_info(accounts_iter)?;

    check_signer(admin)?;
    config.validate()?;
    if !state::is_valid_sink_kind(sink_kind) {
        return Err(InsuranceError::InvalidParameter.into());
    }

    let (expected_vault, vault_bump) = state::derive_fee_vault_pda(program_id, vault_id.key);
    if *vault_pda.key != expected_vault {
        return Err(InsuranceError::InvalidPda.into());
    }
    if !vault_pda.data_is_empty() {
        return Err(InsuranceError::AlreadyInitialized.into());
    }

    let (expected_vault_auth, vault_auth_bump) = state::derive_vault_authority(program_id, &expected_vault);
    if *vault_auth.key != expected_vault_auth {
        return Err(InsuranceError::InvalidPda.into());
    }

    verify_token_program(token_program)?;

    let mint = asset_mint.key.to_bytes();
    cpi::token_account_for_mint(treasury_token, &mint)?;
    verify_premium_sink(program_id, sink_kind, premium_sink, sink_token, &mint, vault_auth.key)?;

    let rent = Rent::from_account_info(rent_sysvar)?;
    let vault_seeds: &[&[u8]] = &[FEE_VAULT_SEED, vault_id.key.as_ref(), &[vault_bump]];
    cpi::create_pda_account(admin, vault_pda, system_program, program_id, &rent, FEE_VAULT_SIZE, vault_seeds)?;
    cpi::initialize_token_account(token_program, vault_token, asset_mint, vault_auth, rent_sysvar)?;

    let mut vault_data = vault_pda.try_borrow_mut_data()?;
    let vault: &mut FeeVault = load_mut(&mut vault_data[..])?;

    vault.is_initialized = 1;
    vault.bump = vault_bump;
    vault.vault_authority_bump = vault_auth_bump;
    vault.sink_kind = sink_kind;
    vault.vault_id = vault_id.key.to_bytes();
    vault.admin = admin.key.to_bytes();
    vault.keeper = keeper.key.to_bytes();
    vault.asset_mint = mint;
    vault.vault_token = vault_token.key.to_bytes();
    vault.treasury_token = treasury_token.key.to_bytes();
    vault.premium_sink = premium_sink.key.to_bytes();
    vault.sink_token = sink_token.key.to_bytes();
    vault.set_fee_config(config)?;

    msg!(
        "FeeVault initialized: mgmt {} bps, perf {} bps, split {} bps, sink {}",
        config.management_fee_bps,
        config.performance_fee_bps,
        config.insurance_split_bps,
        premium_sink.key
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 1: Deposit
// ═══════════════════════════════════════════════════════════════

fn process_deposit(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
    if amount == 0 {
        return Err(InsuranceError::ZeroAmount.into());
    }

    let accounts_iter = &mut accounts.iter();

    let depositor = next_account_info(accounts_iter)?;
    let vault_pda = next_account_info(accounts_iter)?;
    let depositor_token = next_account_info(accounts_iter)?;
    let vault_token = next_account_info(accounts_iter)?;
    let position_pda = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;
    let clock_sysvar = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;

    check_signer(depositor)?;
    check_owner(program_id, vault_pda)?;
    verify_token_program(token_program)?;
    let now = unix_now(clock_sysvar)?;

    let (expected_position, position_bump) =
        state::derive_vault_position_pda(program_id, vault_pda.key, depositor.key);
    if *position_pda.key != expected_position {
        return Err(InsuranceError::InvalidPda.into());
    }
    if position_pda.data_is_empty() {
        let position_seeds: &[&[u8]] = &[
            VAULT_POSITION_SEED, vault_pda.key.as_ref(), depositor.key.as_ref(), &[position_bump],
        ];
        cpi::create_pda_account(
            depositor, position_pda, system_program, program_id, &Rent::get()?, VAULT_POSITION_SIZE, position_seeds,
        )?;
    }

    let mut vault_data = vault_pda.try_borrow_mut_data()?;
    let vault: &mut FeeVault = load_mut(&mut vault_data[..])?;
    if vault.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    check_key(vault_token, &vault.vault_token)?;

    let mut position_data = position_pda.try_borrow_mut_data()?;
    let position: &mut VaultPosition = load_mut(&mut position_data[..])?;
    if position.is_initialized != 1 {
        position.is_initialized = 1;
        position.bump = position_bump;
        position.vault = vault_pda.key.to_bytes();
        position.owner = depositor.key.to_bytes();
    }

    let shares = vault.deposit(position, amount, now)?;
    drop(position_data);
    drop(vault_data);

    cpi::transfer(token_program, depositor_token, vault_token, depositor, amount)?;

    msg!("Deposited {} asset, minted {} vault shares", amount, shares);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 2: Withdraw
// ═══════════════════════════════════════════════════════════════

fn process_withdraw(program_id: &Pubkey, accounts: &[AccountInfo], shares: u64) -> ProgramResult {
    if shares == 0 {
        return Err(InsuranceError::ZeroAmount.into());
    }

    let accounts_iter = &mut accounts.iter();

    let owner = next_account_info(accounts_iter)?;
    let vault_pda = next_account_info(accounts_iter)?;
    let position_pda = next_account_info(accounts_iter)?;
    let vault_token = next_account_info(accounts_iter)?;
    let recipient_token = next_account_info(accounts_iter)?;
    let vault_auth = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;

    check_signer(owner)?;
    check_owner(program_id, vault_pda)?;
    check_owner(program_id, position_pda)?;
    verify_token_program(token_program)?;

    let (expected_vault_auth, vault_auth_bump) = state::derive_vault_authority(program_id, vault_pda.key);
    if *vault_auth.key != expected_vault_auth {
        return Err(InsuranceError::InvalidPda.into());
    }

    let mut vault_data = vault_pda.try_borrow_mut_data()?;
    let vault: &mut FeeVault = load_mut(&mut vault_data[..])?;
    if vault.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    check_key(vault_token, &vault.vault_token)?;

    let mut position_data = position_pda.try_borrow_mut_data()?;
    let position: &mut VaultPosition = load_mut(&mut position_data[..])?;
    if position.is_initialized != 1
        || position.owner != owner.key.to_bytes()
        || position.vault != vault_pda.key.to_bytes()
    {
        return Err(InsuranceError::Unauthorized.into());
    }

    let liquid = cpi::token_balance(vault_token)?;
    let amount = vault.withdraw(position, shares, liquid)?;
    drop(position_data);
    drop(vault_data);

    let vault_auth_seeds: &[&[u8]] = &[VAULT_AUTH_SEED, vault_pda.key.as_ref(), &[vault_auth_bump]];
    cpi::transfer_signed(token_program, vault_token, recipient_token, vault_auth, amount, vault_auth_seeds)?;

    msg!("Withdrew {} asset, burned {} vault shares", amount, shares);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 3: AccrueFees
// ═══════════════════════════════════════════════════════════════

fn process_accrue_fees(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let caller = next_account_info(accounts_iter)?;
    let vault_pda = next_account_info(accounts_iter)?;
    let vault_token = next_account_info(accounts_iter)?;
    let treasury_token = next_account_info(accounts_iter)?;
    let premium_sink = next_account_info(accounts_iter)?;
    let sink_token = next_account_info(accounts_iter)?;
    let vault_auth = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;
    let clock_sysvar = next_account_info(accounts_iter)?;

    check_signer(caller)?;
    check_owner(program_id, vault_pda)?;
    verify_token_program(token_program)?;
    let now = unix_now(clock_sysvar)?;

    let (expected_vault_auth, vault_auth_bump) = state::derive_vault_authority(program_id, vault_pda.key);
    if *vault_auth.key != expected_vault_auth {
        return Err(InsuranceError::InvalidPda.into());
    }

    let mut vault_data = vault_pda.try_borrow_mut_data()?;
    let vault: &mut FeeVault = load_mut(&mut vault_data[..])?;
    if vault.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    check_fee_route(vault, vault_token, treasury_token, premium_sink, sink_token)?;

    let liquid = cpi::token_balance(vault_token)?;
    let vault_authority = vault_auth.key.to_bytes();
    let sink_kind = vault.sink_kind;
    let routing = with_premium_sink(program_id, sink_kind, premium_sink, |sink| {
        vault.accrue_fees(now, liquid, &vault_authority, sink)
    })?;
    drop(vault_data);

    let vault_auth_seeds: &[&[u8]] = &[VAULT_AUTH_SEED, vault_pda.key.as_ref(), &[vault_auth_bump]];
    cpi::transfer_signed(token_program, vault_token, treasury_token, vault_auth, routing.treasury, vault_auth_seeds)?;
    cpi::transfer_signed(token_program, vault_token, sink_token, vault_auth, routing.premium_routed, vault_auth_seeds)?;

    msg!(
        "Accrued fee {}: treasury {}, premium routed {}, retained {}",
        routing.fee,
        routing.treasury,
        routing.premium_routed,
        routing.premium_retained
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 4: Report
// ═══════════════════════════════════════════════════════════════

fn process_report(program_id: &Pubkey, accounts: &[AccountInfo], gain: u64, loss: u64) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let reporter = next_account_info(accounts_iter)?;
    let vault_pda = next_account_info(accounts_iter)?;
    let reporter_token = next_account_info(accounts_iter)?;
    let vault_token = next_account_info(accounts_iter)?;
    let treasury_token = next_account_info(accounts_iter)?;
    let premium_sink = next_account_info(accounts_iter)?;
    let sink_token = next_account_info(accounts_iter)?;
    let vault_auth = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;

    check_signer(reporter)?;
    check_owner(program_id, vault_pda)?;
    verify_token_program(token_program)?;

    let (expected_vault_auth, vault_auth_bump) = state::derive_vault_authority(program_id, vault_pda.key);
    if *vault_auth.key != expected_vault_auth {
        return Err(InsuranceError::InvalidPda.into());
    }

    let mut vault_data = vault_pda.try_borrow_mut_data()?;
    let vault: &mut FeeVault = load_mut(&mut vault_data[..])?;
    if vault.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    check_fee_route(vault, vault_token, treasury_token, premium_sink, sink_token)?;

    // The gain is pulled in below, before any fee leaves.
    let liquid = cpi::token_balance(vault_token)?
        .checked_add(gain)
        .ok_or(InsuranceError::Overflow)?;
    let caller = reporter.key.to_bytes();
    let vault_authority = vault_auth.key.to_bytes();
    let sink_kind = vault.sink_kind;
    let routing = with_premium_sink(program_id, sink_kind, premium_sink, |sink| {
        vault.report(&caller, gain, loss, liquid, &vault_authority, sink)
    })?;
    let total_assets = vault.total_assets;
    drop(vault_data);

    cpi::transfer(token_program, reporter_token, vault_token, reporter, gain)?;
    let vault_auth_seeds: &[&[u8]] = &[VAULT_AUTH_SEED, vault_pda.key.as_ref(), &[vault_auth_bump]];
    cpi::transfer_signed(token_program, vault_token, treasury_token, vault_auth, routing.treasury, vault_auth_seeds)?;
    cpi::transfer_signed(token_program, vault_token, sink_token, vault_auth, routing.premium_routed, vault_auth_seeds)?;

    msg!(
        "Reported gain {} loss {}: performance fee {}, total assets {}",
        gain,
        loss,
        routing.fee,
        total_assets
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 5: UpdateVaultConfig
// ═══════════════════════════════════════════════════════════════

fn process_update_vault_config(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    management_fee_bps: Option<u64>,
    performance_fee_bps: Option<u64>,
    insurance_split_bps: Option<u64>,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let admin = next_account_info(accounts_iter)?;
    let vault_pda = next_account_info(accounts_iter)?;

    check_signer(admin)?;
    check_owner(program_id, vault_pda)?;

    let mut vault_data = vault_pda.try_borrow_mut_data()?;
    let vault: &mut FeeVault = load_mut(&mut vault_data[..])?;
    if vault.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }

    vault.update_config(
        &admin.key.to_bytes(),
        management_fee_bps,
        performance_fee_bps,
        insurance_split_bps,
    )?;

    msg!(
        "Vault config updated: mgmt={}, perf={}, split={}",
        vault.management_fee_bps,
        vault.performance_fee_bps,
        vault.insurance_split_bps
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 6: InitPool
// ═══════════════════════════════════════════════════════════════

fn process_init_pool(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    params: PoolParameters,
    cooldown_secs: u64,
    min_checkpoint_interval: u64,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let admin = next_account_info(accounts_iter)?;
    let strategy = next_account_info(accounts_iter)?;
    let pool_pda = next_account_info(accounts_iter)?;
    let pool_token = next_account_info(accounts_iter)?;
    let pool_auth = next_account_info(accounts_iter)?;
    let asset_mint = next_account_info(accounts_iter)?;
    let payout_recipient = next_account_info(accounts_iter)?;
    let premium_source = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;
    let rent_sysvar = next_account_info(accounts_iter)?;

    check_signer(admin)?;
    params.validate()?;
    state::validate_pool_timers(cooldown_secs, min_checkpoint_interval)?;

    let (expected_pool, pool_bump) = state::derive_pool_pda(program_id, strategy.key);
    if *pool_pda.key != expected_pool {
        return Err(InsuranceError::InvalidPda.into());
    }
    if !pool_pda.data_is_empty() {
        return Err(InsuranceError::AlreadyInitialized.into());
    }

    let (expected_pool_auth, pool_auth_bump) = state::derive_pool_authority(program_id, &expected_pool);
    if *pool_auth.key != expected_pool_auth {
        return Err(InsuranceError::InvalidPda.into());
    }

    verify_token_program(token_program)?;

    let mint = asset_mint.key.to_bytes();
    cpi::token_account_for_mint(payout_recipient, &mint)?;

    let rent = Rent::from_account_info(rent_sysvar)?;
    let pool_seeds: &[&[u8]] = &[POOL_SEED, strategy.key.as_ref(), &[pool_bump]];
    cpi::create_pda_account(admin, pool_pda, system_program, program_id, &rent, INSURANCE_POOL_SIZE, pool_seeds)?;
    cpi::initialize_token_account(token_program, pool_token, asset_mint, pool_auth, rent_sysvar)?;

    let mut pool_data = pool_pda.try_borrow_mut_data()?;
    let pool: &mut InsurancePool = load_mut(&mut pool_data[..])?;

    pool.is_initialized = 1;
    pool.bump = pool_bump;
    pool.pool_authority_bump = pool_auth_bump;
    pool.strategy = strategy.key.to_bytes();
    pool.admin = admin.key.to_bytes();
    pool.asset_mint = mint;
    pool.pool_token = pool_token.key.to_bytes();
    pool.payout_recipient = payout_recipient.key.to_bytes();
    pool.premium_source = premium_source.key.to_bytes();
    pool.cooldown_secs = cooldown_secs;
    pool.min_checkpoint_interval = min_checkpoint_interval;
    pool.apply_parameters(params)?;

    msg!(
        "InsurancePool initialized for strategy {}: deductible {} bps, floor {}, maturity {}s",
        strategy.key,
        params.deductible_bps,
        params.min_liquidity_floor,
        params.checkpoint_maturity_secs
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 7: Stake
// ═══════════════════════════════════════════════════════════════

fn process_stake(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
    if amount == 0 {
        return Err(InsuranceError::ZeroAmount.into());
    }

    let accounts_iter = &mut accounts.iter();

    let staker = next_account_info(accounts_iter)?;
    let pool_pda = next_account_info(accounts_iter)?;
    let staker_token = next_account_info(accounts_iter)?;
    let pool_token = next_account_info(accounts_iter)?;
    let position_pda = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;
    let loss_record = accounts_iter.next();

    check_signer(staker)?;
    check_owner(program_id, pool_pda)?;
    verify_token_program(token_program)?;

    let (expected_position, position_bump) =
        state::derive_stake_position_pda(program_id, pool_pda.key, staker.key);
    if *position_pda.key != expected_position {
        return Err(InsuranceError::InvalidPda.into());
    }
    if position_pda.data_is_empty() {
        let position_seeds: &[&[u8]] = &[
            STAKE_POSITION_SEED, pool_pda.key.as_ref(), staker.key.as_ref(), &[position_bump],
        ];
        cpi::create_pda_account(
            staker, position_pda, system_program, program_id, &Rent::get()?, STAKE_POSITION_SIZE, position_seeds,
        )?;
    }

    let mut pool_data = pool_pda.try_borrow_mut_data()?;
    let pool: &mut InsurancePool = load_mut(&mut pool_data[..])?;
    if pool.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    check_key(pool_token, &pool.pool_token)?;

    let mut position_data = position_pda.try_borrow_mut_data()?;
    let position: &mut StakePosition = load_mut(&mut position_data[..])?;
    if position.is_initialized != 1 {
        position.open(&pool_pda.key.to_bytes(), &staker.key.to_bytes(), position_bump, pool);
    } else if position.staker != staker.key.to_bytes() || position.pool != pool_pda.key.to_bytes() {
        return Err(InsuranceError::Unauthorized.into());
    }

    let end_index = epoch_end_index(program_id, pool_pda.key, pool, position, loss_record)?;
    let shares = pool.stake(position, amount, end_index)?;
    drop(position_data);
    drop(pool_data);

    cpi::transfer(token_program, staker_token, pool_token, staker, amount)?;

    msg!("Staked {} asset, minted {} stake shares", amount, shares);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 8: Unstake
// ═══════════════════════════════════════════════════════════════

fn process_unstake(program_id: &Pubkey, accounts: &[AccountInfo], shares: u64) -> ProgramResult {
    if shares == 0 {
        return Err(InsuranceError::ZeroAmount.into());
    }

    let accounts_iter = &mut accounts.iter();

    let staker = next_account_info(accounts_iter)?;
    let pool_pda = next_account_info(accounts_iter)?;
    let position_pda = next_account_info(accounts_iter)?;
    let pool_token = next_account_info(accounts_iter)?;
    let recipient_token = next_account_info(accounts_iter)?;
    let pool_auth = next_account_info(accounts_iter)?;
    let strategy = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;
    let clock_sysvar = next_account_info(accounts_iter)?;
    let loss_record = accounts_iter.next();

    check_signer(staker)?;
    check_owner(program_id, pool_pda)?;
    check_owner(program_id, position_pda)?;
    verify_token_program(token_program)?;
    let now = unix_now(clock_sysvar)?;

    let (expected_pool_auth, pool_auth_bump) = state::derive_pool_authority(program_id, pool_pda.key);
    if *pool_auth.key != expected_pool_auth {
        return Err(InsuranceError::InvalidPda.into());
    }

    let mut pool_data = pool_pda.try_borrow_mut_data()?;
    let pool: &mut InsurancePool = load_mut(&mut pool_data[..])?;
    if pool.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    check_key(pool_token, &pool.pool_token)?;
    check_key(strategy, &pool.strategy)?;

    // A strategy with no supply cannot be in loss; capital stays free.
    let current_pps = load_strategy(program_id, strategy)?.price_per_share().ok();

    let mut position_data = position_pda.try_borrow_mut_data()?;
    let position = load_position(&mut position_data[..], pool_pda.key, staker.key)?;

    let end_index = epoch_end_index(program_id, pool_pda.key, pool, position, loss_record)?;
    let amount = pool.unstake(position, shares, now, current_pps, end_index)?;
    drop(position_data);
    drop(pool_data);

    let pool_auth_seeds: &[&[u8]] = &[POOL_AUTH_SEED, pool_pda.key.as_ref(), &[pool_auth_bump]];
    cpi::transfer_signed(token_program, pool_token, recipient_token, pool_auth, amount, pool_auth_seeds)?;

    msg!("Unstaked {} shares for {} asset", shares, amount);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 9: RecordPremium
// ═══════════════════════════════════════════════════════════════

fn process_record_premium(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let source = next_account_info(accounts_iter)?;
    let pool_pda = next_account_info(accounts_iter)?;
    let source_token = next_account_info(accounts_iter)?;
    let pool_token = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;

    check_signer(source)?;
    check_owner(program_id, pool_pda)?;
    verify_token_program(token_program)?;

    let mut pool_data = pool_pda.try_borrow_mut_data()?;
    let pool: &mut InsurancePool = load_mut(&mut pool_data[..])?;
    if pool.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    check_key(pool_token, &pool.pool_token)?;

    let credited = pool.record_premium(&source.key.to_bytes(), amount)?;
    drop(pool_data);

    if !credited {
        msg!("No stakers: premium {} not recorded", amount);
        return Ok(());
    }

    cpi::transfer(token_program, source_token, pool_token, source, amount)?;

    msg!("Recorded premium {}", amount);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 10: Claim
// ═══════════════════════════════════════════════════════════════

fn process_claim(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let staker = next_account_info(accounts_iter)?;
    let pool_pda = next_account_info(accounts_iter)?;
    let position_pda = next_account_info(accounts_iter)?;
    let pool_token = next_account_info(accounts_iter)?;
    let recipient_token = next_account_info(accounts_iter)?;
    let pool_auth = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;
    let loss_record = accounts_iter.next();

    check_signer(staker)?;
    check_owner(program_id, pool_pda)?;
    check_owner(program_id, position_pda)?;
    verify_token_program(token_program)?;

    let (expected_pool_auth, pool_auth_bump) = state::derive_pool_authority(program_id, pool_pda.key);
    if *pool_auth.key != expected_pool_auth {
        return Err(InsuranceError::InvalidPda.into());
    }

    let mut pool_data = pool_pda.try_borrow_mut_data()?;
    let pool: &mut InsurancePool = load_mut(&mut pool_data[..])?;
    if pool.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    check_key(pool_token, &pool.pool_token)?;

    let mut position_data = position_pda.try_borrow_mut_data()?;
    let position = load_position(&mut position_data[..], pool_pda.key, staker.key)?;

    let end_index = epoch_end_index(program_id, pool_pda.key, pool, position, loss_record)?;
    let amount = pool.claim(position, end_index)?;
    drop(position_data);
    drop(pool_data);

    let pool_auth_seeds: &[&[u8]] = &[POOL_AUTH_SEED, pool_pda.key.as_ref(), &[pool_auth_bump]];
    cpi::transfer_signed(token_program, pool_token, recipient_token, pool_auth, amount, pool_auth_seeds)?;

    msg!("Claimed premium {}", amount);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 11: UpdateCheckpoint
// ═══════════════════════════════════════════════════════════════

fn process_update_checkpoint(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let caller = next_account_info(accounts_iter)?;
    let pool_pda = next_account_info(accounts_iter)?;
    let strategy = next_account_info(accounts_iter)?;
    let clock_sysvar = next_account_info(accounts_iter)?;

    check_signer(caller)?;
    check_owner(program_id, pool_pda)?;
    let now = unix_now(clock_sysvar)?;

    let mut pool_data = pool_pda.try_borrow_mut_data()?;
    let pool: &mut InsurancePool = load_mut(&mut pool_data[..])?;
    if pool.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    check_key(strategy, &pool.strategy)?;

    let totals = load_strategy(program_id, strategy)?;
    let pps = pool.update_checkpoint(now, totals)?;

    msg!("Checkpoint set to pps {} at {}", pps, now);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 12: TriggerLoss
// ═══════════════════════════════════════════════════════════════

fn process_trigger_loss(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let caller = next_account_info(accounts_iter)?;
    let pool_pda = next_account_info(accounts_iter)?;
    let strategy = next_account_info(accounts_iter)?;
    let record_pda = next_account_info(accounts_iter)?;
    let pool_token = next_account_info(accounts_iter)?;
    let payout_recipient = next_account_info(accounts_iter)?;
    let caller_token = next_account_info(accounts_iter)?;
    let pool_auth = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;
    let clock_sysvar = next_account_info(accounts_iter)?;

    check_signer(caller)?;
    check_owner(program_id, pool_pda)?;
    verify_token_program(token_program)?;
    let now = unix_now(clock_sysvar)?;

    let (expected_pool_auth, pool_auth_bump) = state::derive_pool_authority(program_id, pool_pda.key);
    if *pool_auth.key != expected_pool_auth {
        return Err(InsuranceError::InvalidPda.into());
    }

    let mut pool_data = pool_pda.try_borrow_mut_data()?;
    let pool: &mut InsurancePool = load_mut(&mut pool_data[..])?;
    if pool.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    check_key(strategy, &pool.strategy)?;
    check_key(pool_token, &pool.pool_token)?;
    check_key(payout_recipient, &pool.payout_recipient)?;

    let epoch = pool.loss_epoch;
    let (expected_record, record_bump) = state::derive_loss_record_pda(program_id, pool_pda.key, epoch);
    if *record_pda.key != expected_record {
        return Err(InsuranceError::InvalidPda.into());
    }
    if !record_pda.data_is_empty() {
        return Err(InsuranceError::AlreadyInitialized.into());
    }

    let totals = load_strategy(program_id, strategy)?;
    let loss = pool.trigger_loss(now, totals)?;
    drop(pool_data);

    let compensated = credit_insured_vault(program_id, strategy, payout_recipient, loss.net)?;

    let epoch_bytes = epoch.to_le_bytes();
    let record_seeds: &[&[u8]] = &[LOSS_RECORD_SEED, pool_pda.key.as_ref(), &epoch_bytes, &[record_bump]];
    cpi::create_pda_account(
        caller, record_pda, system_program, program_id, &Rent::get()?, LOSS_RECORD_SIZE, record_seeds,
    )?;
    let mut record_data = record_pda.try_borrow_mut_data()?;
    let record: &mut LossRecord = load_mut(&mut record_data[..])?;
    record.write(&pool_pda.key.to_bytes(), &caller.key.to_bytes(), record_bump, &loss);
    drop(record_data);

    let pool_auth_seeds: &[&[u8]] = &[POOL_AUTH_SEED, pool_pda.key.as_ref(), &[pool_auth_bump]];
    cpi::transfer_signed(token_program, pool_token, payout_recipient, pool_auth, loss.net, pool_auth_seeds)?;
    cpi::transfer_signed(token_program, pool_token, caller_token, pool_auth, loss.caller_reward, pool_auth_seeds)?;

    msg!(
        "Loss triggered (epoch {}): pps {} -> {}, paid {} to vault, {} to caller",
        loss.epoch,
        loss.checkpoint_pps,
        loss.observed_pps,
        loss.net,
        loss.caller_reward
    );
    if compensated {
        msg!("Payout credited to insured vault assets");
    }
    Ok(())
}

/// When the insured strategy is a `FeeVault` of this program and the payout
/// lands in its own token account, book the payout as vault assets.
fn credit_insured_vault(
    program_id: &Pubkey,
    strategy: &AccountInfo,
    payout_recipient: &AccountInfo,
    amount: u64,
) -> Result<bool, ProgramError> {
    if strategy.owner != program_id || strategy.data_len() != FEE_VAULT_SIZE {
        return Ok(false);
    }
    let mut data = strategy.try_borrow_mut_data()?;
    let vault: &mut FeeVault = load_mut(&mut data[..])?;
    if vault.vault_token != payout_recipient.key.to_bytes() {
        return Ok(false);
    }
    vault.receive_compensation(amount)?;
    Ok(true)
}

// ═══════════════════════════════════════════════════════════════
// 13: SetParameters
// ═══════════════════════════════════════════════════════════════

fn process_set_parameters(program_id: &Pubkey, accounts: &[AccountInfo], params: PoolParameters) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let admin = next_account_info(accounts_iter)?;
    let pool_pda = next_account_info(accounts_iter)?;

    check_signer(admin)?;
    check_owner(program_id, pool_pda)?;

    let mut pool_data = pool_pda.try_borrow_mut_data()?;
    let pool: &mut InsurancePool = load_mut(&mut pool_data[..])?;
    if pool.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }

    pool.set_parameters(&admin.key.to_bytes(), params)?;

    msg!(
        "Pool parameters updated: deductible={}, floor={}, maturity={}, reward={}",
        params.deductible_bps,
        params.min_liquidity_floor,
        params.checkpoint_maturity_secs,
        params.caller_reward_bps
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 14: InitGlue
// ═══════════════════════════════════════════════════════════════

fn process_init_glue(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let admin = next_account_info(accounts_iter)?;
    let glue_id = next_account_info(accounts_iter)?;
    let glue_pda = next_account_info(accounts_iter)?;
    let collateral_token = next_account_info(accounts_iter)?;
    let glue_auth = next_account_info(accounts_iter)?;
    let asset_mint = next_account_info(accounts_iter)?;
    let minter = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;
    let rent_sysvar = next_account_info(accounts_iter)?;

    check_signer(admin)?;

    let (expected_glue, glue_bump) = state::derive_glue_pda(program_id, glue_id.key);
    if *glue_pda.key != expected_glue {
        return Err(InsuranceError::InvalidPda.into());
    }
    if !glue_pda.data_is_empty() {
        return Err(InsuranceError::AlreadyInitialized.into());
    }

    let (expected_glue_auth, glue_auth_bump) = state::derive_glue_authority(program_id, &expected_glue);
    if *glue_auth.key != expected_glue_auth {
        return Err(InsuranceError::InvalidPda.into());
    }

    verify_token_program(token_program)?;

    let rent = Rent::from_account_info(rent_sysvar)?;
    let glue_seeds: &[&[u8]] = &[GLUE_SEED, glue_id.key.as_ref(), &[glue_bump]];
    cpi::create_pda_account(admin, glue_pda, system_program, program_id, &rent, GLUE_TOKEN_SIZE, glue_seeds)?;
    cpi::initialize_token_account(token_program, collateral_token, asset_mint, glue_auth, rent_sysvar)?;

    let mut glue_data = glue_pda.try_borrow_mut_data()?;
    let glue: &mut GlueToken = load_mut(&mut glue_data[..])?;

    glue.is_initialized = 1;
    glue.bump = glue_bump;
    glue.authority_bump = glue_auth_bump;
    glue.glue_id = glue_id.key.to_bytes();
    glue.admin = admin.key.to_bytes();
    glue.minter = minter.key.to_bytes();
    glue.asset_mint = asset_mint.key.to_bytes();
    glue.collateral_token = collateral_token.key.to_bytes();

    msg!("GlueToken initialized: minter {}", minter.key);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 15: GlueDeposit
// ═══════════════════════════════════════════════════════════════

fn process_glue_deposit(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let depositor = next_account_info(accounts_iter)?;
    let glue_pda = next_account_info(accounts_iter)?;
    let depositor_token = next_account_info(accounts_iter)?;
    let collateral_token = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;

    check_signer(depositor)?;
    check_owner(program_id, glue_pda)?;
    verify_token_program(token_program)?;

    let mut glue_data = glue_pda.try_borrow_mut_data()?;
    let glue: &mut GlueToken = load_mut(&mut glue_data[..])?;
    if glue.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    check_key(collateral_token, &glue.collateral_token)?;

    glue.deposit(amount)?;
    let collateral = glue.collateral_pool;
    drop(glue_data);

    cpi::transfer(token_program, depositor_token, collateral_token, depositor, amount)?;

    msg!("Glue collateral +{} (pool {})", amount, collateral);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 16: GlueMint
// ═══════════════════════════════════════════════════════════════

fn process_glue_mint(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let minter = next_account_info(accounts_iter)?;
    let glue_pda = next_account_info(accounts_iter)?;
    let minter_token = next_account_info(accounts_iter)?;
    let collateral_token = next_account_info(accounts_iter)?;
    let recipient = next_account_info(accounts_iter)?;
    let balance_pda = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;

    check_signer(minter)?;
    check_owner(program_id, glue_pda)?;
    verify_token_program(token_program)?;

    let (expected_balance, balance_bump) =
        state::derive_glue_balance_pda(program_id, glue_pda.key, recipient.key);
    if *balance_pda.key != expected_balance {
        return Err(InsuranceError::InvalidPda.into());
    }
    if balance_pda.data_is_empty() {
        let balance_seeds: &[&[u8]] = &[
            GLUE_BALANCE_SEED, glue_pda.key.as_ref(), recipient.key.as_ref(), &[balance_bump],
        ];
        cpi::create_pda_account(
            minter, balance_pda, system_program, program_id, &Rent::get()?, GLUE_BALANCE_SIZE, balance_seeds,
        )?;
    }

    let mut glue_data = glue_pda.try_borrow_mut_data()?;
    let glue: &mut GlueToken = load_mut(&mut glue_data[..])?;
    if glue.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    check_key(collateral_token, &glue.collateral_token)?;

    let mut balance_data = balance_pda.try_borrow_mut_data()?;
    let balance: &mut GlueBalance = load_mut(&mut balance_data[..])?;
    if balance.is_initialized != 1 {
        balance.is_initialized = 1;
        balance.bump = balance_bump;
        balance.glue = glue_pda.key.to_bytes();
        balance.holder = recipient.key.to_bytes();
    }

    let units = glue.mint(&minter.key.to_bytes(), balance, amount)?;
    drop(balance_data);
    drop(glue_data);

    cpi::transfer(token_program, minter_token, collateral_token, minter, amount)?;

    msg!("Minted {} glue units to {} for {} collateral", units, recipient.key, amount);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 17: GlueRedeem
// ═══════════════════════════════════════════════════════════════

fn process_glue_redeem(program_id: &Pubkey, accounts: &[AccountInfo], units: u64) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let holder = next_account_info(accounts_iter)?;
    let glue_pda = next_account_info(accounts_iter)?;
    let balance_pda = next_account_info(accounts_iter)?;
    let collateral_token = next_account_info(accounts_iter)?;
    let recipient_token = next_account_info(accounts_iter)?;
    let glue_auth = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;

    check_signer(holder)?;
    check_owner(program_id, glue_pda)?;
    check_owner(program_id, balance_pda)?;
    verify_token_program(token_program)?;

    let (expected_glue_auth, glue_auth_bump) = state::derive_glue_authority(program_id, glue_pda.key);
    if *glue_auth.key != expected_glue_auth {
        return Err(InsuranceError::InvalidPda.into());
    }

    let mut glue_data = glue_pda.try_borrow_mut_data()?;
    let glue: &mut GlueToken = load_mut(&mut glue_data[..])?;
    if glue.is_initialized != 1 {
        return Err(InsuranceError::NotInitialized.into());
    }
    check_key(collateral_token, &glue.collateral_token)?;

    let mut balance_data = balance_pda.try_borrow_mut_data()?;
    let balance: &mut GlueBalance = load_mut(&mut balance_data[..])?;
    if balance.is_initialized != 1
        || balance.holder != holder.key.to_bytes()
        || balance.glue != glue_pda.key.to_bytes()
    {
        return Err(InsuranceError::Unauthorized.into());
    }

    let amount = glue.redeem(balance, units)?;
    drop(balance_data);
    drop(glue_data);

    let glue_auth_seeds: &[&[u8]] = &[GLUE_AUTH_SEED, glue_pda.key.as_ref(), &[glue_auth_bump]];
    cpi::transfer_signed(token_program, collateral_token, recipient_token, glue_auth, amount, glue_auth_seeds)?;

    msg!("Redeemed {} glue units for {} collateral", units, amount);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 18: InitRegistry
// ═══════════════════════════════════════════════════════════════

fn process_init_registry(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let registrar = next_account_info(accounts_iter)?;
    let registry_pda = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;

    check_signer(registrar)?;

    let (expected_registry, registry_bump) = state::derive_registry_pda(program_id);
    if *registry_pda.key != expected_registry {
        return Err(InsuranceError::InvalidPda.into());
    }
    if !registry_pda.data_is_empty() {
        return Err(InsuranceError::AlreadyInitialized.into());
    }

    let registry_seeds: &[&[u8]] = &[REGISTRY_SEED, &[registry_bump]];
    cpi::create_pda_account(
        registrar, registry_pda, system_program, program_id, &Rent::get()?, REGISTRY_SIZE, registry_seeds,
    )?;

    let mut registry_data = registry_pda.try_borrow_mut_data()?;
    let registry: &mut Registry = load_mut(&mut registry_data[..])?;
    registry.is_initialized = 1;
    registry.bump = registry_bump;
    registry.registrar = registrar.key.to_bytes();

    msg!("Registry initialized, registrar {}", registrar.key);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 19: RegisterVault
// ═══════════════════════════════════════════════════════════════

fn process_register_vault(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let registrar = next_account_info(accounts_iter)?;
    let registry_pda = next_account_info(accounts_iter)?;
    let vault_pda = next_account_info(accounts_iter)?;
    let pool_pda = next_account_info(accounts_iter)?;
    let entry_pda = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;
    let clock_sysvar = next_account_info(accounts_iter)?;

    check_signer(registrar)?;
    check_owner(program_id, registry_pda)?;
    check_owner(program_id, vault_pda)?;
    check_owner(program_id, pool_pda)?;
    let now = unix_now(clock_sysvar)?;

    {
        let registry_data = registry_pda.try_borrow_data()?;
        let registry: &Registry = load(&registry_data[..])?;
        if registry.is_initialized != 1 {
            return Err(InsuranceError::NotInitialized.into());
        }
        if registry.registrar != registrar.key.to_bytes() {
            return Err(InsuranceError::Unauthorized.into());
        }

        let vault_data = vault_pda.try_borrow_data()?;
        let vault: &FeeVault = load(&vault_data[..])?;
        let pool_data = pool_pda.try_borrow_data()?;
        let pool: &InsurancePool = load(&pool_data[..])?;
        if vault.is_initialized != 1 || pool.is_initialized != 1 {
            return Err(InsuranceError::NotInitialized.into());
        }
    }

    let (expected_entry, entry_bump) = state::derive_registry_entry_pda(program_id, vault_pda.key);
    if *entry_pda.key != expected_entry {
        return Err(InsuranceError::InvalidPda.into());
    }
    if !entry_pda.data_is_empty() {
        return Err(InsuranceError::AlreadyRegistered.into());
    }

    let entry_seeds: &[&[u8]] = &[REGISTRY_ENTRY_SEED, vault_pda.key.as_ref(), &[entry_bump]];
    cpi::create_pda_account(
        registrar, entry_pda, system_program, program_id, &Rent::get()?, REGISTRY_ENTRY_SIZE, entry_seeds,
    )?;

    let mut registry_data = registry_pda.try_borrow_mut_data()?;
    let registry: &mut Registry = load_mut(&mut registry_data[..])?;
    let mut entry_data = entry_pda.try_borrow_mut_data()?;
    let entry: &mut RegistryEntry = load_mut(&mut entry_data[..])?;

    registry.register(
        &registrar.key.to_bytes(),
        entry,
        &vault_pda.key.to_bytes(),
        &pool_pda.key.to_bytes(),
        entry_bump,
        now,
    )?;

    msg!("Registered vault {} -> pool {} ({} entries)", vault_pda.key, pool_pda.key, registry.entries);
    Ok(())
}
