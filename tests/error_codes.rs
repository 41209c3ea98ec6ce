//! Error code uniqueness, completeness and classification tests.

use solana_program::program_error::ProgramError;
use vault_insurance::error::{ErrorKind, InsuranceError};

const ALL_ERRORS: [InsuranceError; 22] = [
    InsuranceError::AlreadyInitialized,
    InsuranceError::NotInitialized,
    InsuranceError::ZeroAmount,
    InsuranceError::InvalidParameter,
    InsuranceError::NothingToClaim,
    InsuranceError::AlreadyRegistered,
    InsuranceError::InvalidPda,
    InsuranceError::InvalidMint,
    InsuranceError::Unauthorized,
    InsuranceError::NotPremiumSource,
    InsuranceError::NoTimeElapsed,
    InsuranceError::CheckpointTooSoon,
    InsuranceError::PpsNotIncreased,
    InsuranceError::NoCheckpoint,
    InsuranceError::CheckpointNotMatured,
    InsuranceError::LossBelowDeductible,
    InsuranceError::CooldownActive,
    InsuranceError::InsufficientLiquidity,
    InsuranceError::BelowLiquidityFloor,
    InsuranceError::InsufficientShares,
    InsuranceError::Overflow,
    InsuranceError::ZeroSupply,
];

#[test]
fn test_all_error_codes_unique() {
    let codes: Vec<u32> = ALL_ERRORS.iter().map(|e| *e as u32).collect();

    // Check uniqueness
    let mut sorted = codes.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), codes.len(), "Duplicate error codes detected!");

    // Check sequential (0..21)
    for (i, &code) in codes.iter().enumerate() {
        assert_eq!(code, i as u32, "Error code {} expected {}, got {}", i, i, code);
    }
}

#[test]
fn test_error_to_program_error() {
    let err: ProgramError = InsuranceError::LossBelowDeductible.into();
    match err {
        ProgramError::Custom(code) => assert_eq!(code, 15),
        _ => panic!("Expected Custom error"),
    }
}

#[test]
fn test_all_errors_are_custom() {
    for err in &ALL_ERRORS {
        let pe: ProgramError = (*err).into();
        assert_eq!(pe, ProgramError::Custom(*err as u32));
    }
}

#[test]
fn test_error_kinds() {
    assert_eq!(InsuranceError::ZeroAmount.kind(), ErrorKind::Validation);
    assert_eq!(InsuranceError::AlreadyRegistered.kind(), ErrorKind::Validation);
    assert_eq!(InsuranceError::Unauthorized.kind(), ErrorKind::Authorization);
    assert_eq!(InsuranceError::NotPremiumSource.kind(), ErrorKind::Authorization);
    assert_eq!(InsuranceError::CheckpointTooSoon.kind(), ErrorKind::State);
    assert_eq!(InsuranceError::CooldownActive.kind(), ErrorKind::State);
    assert_eq!(InsuranceError::BelowLiquidityFloor.kind(), ErrorKind::Liquidity);
    assert_eq!(InsuranceError::InsufficientShares.kind(), ErrorKind::Liquidity);
    assert_eq!(InsuranceError::Overflow.kind(), ErrorKind::Arithmetic);
    assert_eq!(InsuranceError::ZeroSupply.kind(), ErrorKind::Arithmetic);
}

#[test]
fn test_kinds_are_contiguous_ranges() {
    // Codes are grouped by kind so clients can classify by range.
    let mut last = ALL_ERRORS[0].kind();
    let mut seen = vec![last];
    for err in &ALL_ERRORS[1..] {
        let kind = err.kind();
        if kind != last {
            assert!(!seen.contains(&kind), "{:?} reappears at {:?}", kind, err);
            seen.push(kind);
            last = kind;
        }
    }
    assert_eq!(seen.len(), 5);
}
