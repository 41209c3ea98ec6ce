//! SPL Token and System program CPI helpers.
//!
//! Every asset movement goes through here. Transfers out of program-owned
//! token accounts are signed by the owning authority PDA.

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    instruction::Instruction,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
};
use spl_token::state::Account as TokenAccount;

use crate::error::InsuranceError;

/// Verify the token program is the real SPL Token program.
/// Must run before any `invoke_signed` that lends a PDA signature to it.
pub fn verify_token_program(token_program: &AccountInfo) -> ProgramResult {
    if *token_program.key != spl_token::id() {
        msg!("Error: invalid token program {}", token_program.key);
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

/// Build an SPL `Transfer` instruction.
pub fn build_transfer(
    token_program: &Pubkey,
    source: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    spl_token::instruction::transfer(token_program, source, destination, authority, &[], amount)
}

/// Transfer signed by a wallet that signed the outer transaction.
pub fn transfer<'a>(
    token_program: &AccountInfo<'a>,
    source: &AccountInfo<'a>,
    destination: &AccountInfo<'a>,
    authority: &AccountInfo<'a>,
    amount: u64,
) -> ProgramResult {
    if amount == 0 {
        return Ok(());
    }
    invoke(
        &build_transfer(token_program.key, source.key, destination.key, authority.key, amount)?,
        &[source.clone(), destination.clone(), authority.clone(), token_program.clone()],
    )
}

/// Transfer out of a token account owned by an authority PDA.
pub fn transfer_signed<'a>(
    token_program: &AccountInfo<'a>,
    source: &AccountInfo<'a>,
    destination: &AccountInfo<'a>,
    authority: &AccountInfo<'a>,
    amount: u64,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    if amount == 0 {
        return Ok(());
    }
    invoke_signed(
        &build_transfer(token_program.key, source.key, destination.key, authority.key, amount)?,
        &[source.clone(), destination.clone(), authority.clone(), token_program.clone()],
        &[signer_seeds],
    )
}

/// Initialize a pre-allocated token account owned by `authority`.
pub fn initialize_token_account<'a>(
    token_program: &AccountInfo<'a>,
    account: &AccountInfo<'a>,
    mint: &AccountInfo<'a>,
    authority: &AccountInfo<'a>,
    rent_sysvar: &AccountInfo<'a>,
) -> ProgramResult {
    invoke(
        &spl_token::instruction::initialize_account(
            token_program.key,
            account.key,
            mint.key,
            authority.key,
        )?,
        &[account.clone(), mint.clone(), authority.clone(), rent_sysvar.clone()],
    )
}

/// Unpack an SPL token account. Rejects accounts not owned by the token program.
pub fn unpack_token_account(account: &AccountInfo) -> Result<TokenAccount, ProgramError> {
    if *account.owner != spl_token::id() {
        return Err(ProgramError::IncorrectProgramId);
    }
    let data = account.try_borrow_data()?;
    TokenAccount::unpack(&data)
}

/// Unpack a token account and check it holds `mint`.
pub fn token_account_for_mint(account: &AccountInfo, mint: &[u8; 32]) -> Result<TokenAccount, ProgramError> {
    let token = unpack_token_account(account)?;
    if token.mint.to_bytes() != *mint {
        return Err(InsuranceError::InvalidMint.into());
    }
    Ok(token)
}

/// Current balance of a token account.
pub fn token_balance(account: &AccountInfo) -> Result<u64, ProgramError> {
    Ok(unpack_token_account(account)?.amount)
}

/// System instructions that bring `new_account` to a rent-exempt,
/// program-owned account of `size` bytes.
///
/// A PDA address can be funded by anyone before it is created, and
/// `create_account` refuses an address that already holds lamports. A funded
/// address is topped up, then allocated and assigned instead.
pub fn pda_creation_instructions(
    payer: &Pubkey,
    new_account: &Pubkey,
    current_lamports: u64,
    program_id: &Pubkey,
    rent: &Rent,
    size: usize,
) -> Vec<Instruction> {
    let required = rent.minimum_balance(size);
    if current_lamports == 0 {
        return vec![system_instruction::create_account(
            payer,
            new_account,
            required,
            size as u64,
            program_id,
        )];
    }
    let mut instructions = Vec::with_capacity(3);
    let top_up = required.saturating_sub(current_lamports);
    if top_up > 0 {
        instructions.push(system_instruction::transfer(payer, new_account, top_up));
    }
    instructions.push(system_instruction::allocate(new_account, size as u64));
    instructions.push(system_instruction::assign(new_account, program_id));
    instructions
}

/// Create a program-owned PDA account of `size` bytes, rent-exempt.
/// Works whether or not the address was funded beforehand.
pub fn create_pda_account<'a>(
    payer: &AccountInfo<'a>,
    new_account: &AccountInfo<'a>,
    system_program: &AccountInfo<'a>,
    program_id: &Pubkey,
    rent: &Rent,
    size: usize,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    let instructions = pda_creation_instructions(
        payer.key,
        new_account.key,
        new_account.lamports(),
        program_id,
        rent,
        size,
    );
    for instruction in &instructions {
        invoke_signed(
            instruction,
            &[payer.clone(), new_account.clone(), system_program.clone()],
            &[signer_seeds],
        )?;
    }
    Ok(())
}
