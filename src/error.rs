use solana_program::program_error::ProgramError;

/// Failure classes. Every error aborts the whole instruction; callers decide
/// whether to resubmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    State,
    Liquidity,
    Arithmetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum InsuranceError {
    /// Account already initialized
    AlreadyInitialized = 0,
    /// Account not initialized
    NotInitialized = 1,
    /// Zero amount, or an amount that mints / pays nothing
    ZeroAmount = 2,
    /// Parameter out of range (bps above 10_000, unknown sink kind)
    InvalidParameter = 3,
    /// Nothing pending to claim
    NothingToClaim = 4,
    /// Vault already has a registry entry
    AlreadyRegistered = 5,
    /// Invalid PDA derivation or account mismatch
    InvalidPda = 6,
    /// Token account mint does not match the configured asset
    InvalidMint = 7,
    /// Signer is not the admin / keeper / minter / registrar
    Unauthorized = 8,
    /// Caller is not the vault allowed to record premium
    NotPremiumSource = 9,
    /// No time elapsed since the last fee accrual
    NoTimeElapsed = 10,
    /// Checkpoint minimum interval not elapsed
    CheckpointTooSoon = 11,
    /// Strategy PPS did not rise above the checkpoint
    PpsNotIncreased = 12,
    /// No checkpoint recorded yet
    NoCheckpoint = 13,
    /// Checkpoint has not matured
    CheckpointNotMatured = 14,
    /// PPS drop does not exceed the deductible
    LossBelowDeductible = 15,
    /// Post-loss cooldown still in force
    CooldownActive = 16,
    /// Withdrawal or payout exceeds available capital
    InsufficientLiquidity = 17,
    /// Pool capital below the configured liquidity floor
    BelowLiquidityFloor = 18,
    /// Shares / units above the holder's balance
    InsufficientShares = 19,
    /// Arithmetic overflow
    Overflow = 20,
    /// Division by a zero supply
    ZeroSupply = 21,
}

impl InsuranceError {
    pub fn kind(&self) -> ErrorKind {
        use InsuranceError::*;
        match self {
            AlreadyInitialized | NotInitialized | ZeroAmount | InvalidParameter
            | NothingToClaim | AlreadyRegistered | InvalidPda | InvalidMint => {
                ErrorKind::Validation
            }
            Unauthorized | NotPremiumSource => ErrorKind::Authorization,
            NoTimeElapsed | CheckpointTooSoon | PpsNotIncreased | NoCheckpoint
            | CheckpointNotMatured | LossBelowDeductible | CooldownActive => ErrorKind::State,
            InsufficientLiquidity | BelowLiquidityFloor | InsufficientShares => {
                ErrorKind::Liquidity
            }
            Overflow | ZeroSupply => ErrorKind::Arithmetic,
        }
    }
}

impl From<InsuranceError> for ProgramError {
    fn from(e: InsuranceError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
