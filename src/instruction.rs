use solana_program::program_error::ProgramError;

/// Instructions for the vault insurance program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsuranceInstruction {
    /// Create a fee-routing vault.
    ///
    /// The premium sink (insurance pool or glue token) must already exist.
    /// An insurance pool sink must name this vault's authority PDA as its
    /// premium source.
    ///
    /// Accounts:
    ///   0. `[signer, writable]` Admin (pays rent, becomes vault admin)
    ///   1. `[]` Vault id (any key; seeds the vault PDA)
    ///   2. `[writable]` FeeVault PDA (to be created)
    ///   3. `[writable]` Vault token account (allocated, uninitialized; authority = vault_auth PDA)
    ///   4. `[]` Vault authority PDA
    ///   5. `[]` Asset mint
    ///   6. `[]` Keeper
    ///   7. `[]` Treasury token account
    ///   8. `[]` Premium sink (InsurancePool or GlueToken)
    ///   9. `[]` Sink token account (pool token / glue collateral token)
    ///  10. `[]` Token program
    ///  11. `[]` System program
    ///  12. `[]` Rent sysvar
    InitVault {
        management_fee_bps: u16,
        performance_fee_bps: u16,
        insurance_split_bps: u16,
        sink_kind: u8,
    },

    /// Deposit asset into the vault, minting shares at the current PPS.
    ///
    /// Accounts:
    ///   0. `[signer, writable]` Depositor (pays rent for the position)
    ///   1. `[writable]` FeeVault PDA
    ///   2. `[writable]` Depositor token account (source)
    ///   3. `[writable]` Vault token account (destination)
    ///   4. `[writable]` VaultPosition PDA (created if needed)
    ///   5. `[]` Token program
    ///   6. `[]` Clock sysvar
    ///   7. `[]` System program
    Deposit { amount: u64 },

    /// Burn vault shares for their pro-rata share of assets.
    ///
    /// Accounts:
    ///   0. `[signer]` Position owner
    ///   1. `[writable]` FeeVault PDA
    ///   2. `[writable]` VaultPosition PDA
    ///   3. `[writable]` Vault token account (source)
    ///   4. `[writable]` Recipient token account
    ///   5. `[]` Vault authority PDA
    ///   6. `[]` Token program
    Withdraw { shares: u64 },

    /// Accrue the management fee since the last accrual and route it.
    /// Permissionless.
    ///
    /// Accounts:
    ///   0. `[signer]` Caller
    ///   1. `[writable]` FeeVault PDA
    ///   2. `[writable]` Vault token account
    ///   3. `[writable]` Treasury token account
    ///   4. `[writable]` Premium sink
    ///   5. `[writable]` Sink token account
    ///   6. `[]` Vault authority PDA
    ///   7. `[]` Token program
    ///   8. `[]` Clock sysvar
    AccrueFees,

    /// Keeper reports strategy profit / loss. Gains are pulled from the
    /// reporter and charged the performance fee.
    ///
    /// Accounts:
    ///   0. `[signer]` Keeper or admin
    ///   1. `[writable]` FeeVault PDA
    ///   2. `[writable]` Reporter token account (source of the gain)
    ///   3. `[writable]` Vault token account
    ///   4. `[writable]` Treasury token account
    ///   5. `[writable]` Premium sink
    ///   6. `[writable]` Sink token account
    ///   7. `[]` Vault authority PDA
    ///   8. `[]` Token program
    Report { gain: u64, loss: u64 },

    /// Admin updates vault fee configuration.
    ///
    /// Accounts:
    ///   0. `[signer]` Admin
    ///   1. `[writable]` FeeVault PDA
    UpdateVaultConfig {
        management_fee_bps: Option<u16>,
        performance_fee_bps: Option<u16>,
        insurance_split_bps: Option<u16>,
    },

    /// Create an insurance pool covering a strategy.
    ///
    /// Accounts:
    ///   0. `[signer, writable]` Admin (pays rent, becomes pool admin)
    ///   1. `[]` Strategy account
    ///   2. `[writable]` InsurancePool PDA (to be created)
    ///   3. `[writable]` Pool token account (allocated, uninitialized; authority = pool_auth PDA)
    ///   4. `[]` Pool authority PDA
    ///   5. `[]` Asset mint
    ///   6. `[]` Payout recipient token account
    ///   7. `[]` Premium source (usually the fee vault authority PDA)
    ///   8. `[]` Token program
    ///   9. `[]` System program
    ///  10. `[]` Rent sysvar
    InitPool {
        deductible_bps: u16,
        min_liquidity_floor: u64,
        checkpoint_maturity_secs: u64,
        caller_reward_bps: u16,
        cooldown_secs: u64,
        min_checkpoint_interval: u64,
    },

    /// Stake asset as underwriting capital.
    ///
    /// Accounts:
    ///   0. `[signer, writable]` Staker (pays rent for the position)
    ///   1. `[writable]` InsurancePool PDA
    ///   2. `[writable]` Staker token account (source)
    ///   3. `[writable]` Pool token account (destination)
    ///   4. `[writable]` StakePosition PDA (created if needed)
    ///   5. `[]` Token program
    ///   6. `[]` System program
    ///   7. `[]` (optional) LossRecord of the position's epoch, if a loss wiped it
    Stake { amount: u64 },

    /// Burn stake shares for pool capital. Fails while a loss is pending.
    ///
    /// Accounts:
    ///   0. `[signer]` Staker
    ///   1. `[writable]` InsurancePool PDA
    ///   2. `[writable]` StakePosition PDA
    ///   3. `[writable]` Pool token account (source)
    ///   4. `[writable]` Recipient token account
    ///   5. `[]` Pool authority PDA
    ///   6. `[]` Strategy account
    ///   7. `[]` Token program
    ///   8. `[]` Clock sysvar
    ///   9. `[]` (optional) LossRecord of the position's epoch
    Unstake { shares: u64 },

    /// Credit premium to current stakers. Signer must be the pool's
    /// premium source. No-op (no transfer) when nobody is staked.
    ///
    /// Accounts:
    ///   0. `[signer]` Premium source
    ///   1. `[writable]` InsurancePool PDA
    ///   2. `[writable]` Source token account
    ///   3. `[writable]` Pool token account
    ///   4. `[]` Token program
    RecordPremium { amount: u64 },

    /// Withdraw accumulated premium.
    ///
    /// Accounts:
    ///   0. `[signer]` Staker
    ///   1. `[writable]` InsurancePool PDA
    ///   2. `[writable]` StakePosition PDA
    ///   3. `[writable]` Pool token account (source)
    ///   4. `[writable]` Recipient token account
    ///   5. `[]` Pool authority PDA
    ///   6. `[]` Token program
    ///   7. `[]` (optional) LossRecord of the position's epoch
    Claim,

    /// Ratchet the pool checkpoint to the strategy's current PPS.
    /// Permissionless.
    ///
    /// Accounts:
    ///   0. `[signer]` Caller
    ///   1. `[writable]` InsurancePool PDA
    ///   2. `[]` Strategy account
    ///   3. `[]` Clock sysvar
    UpdateCheckpoint,

    /// Pay out the pool after a PPS drop beyond the deductible.
    /// Permissionless; the caller earns `caller_reward_bps` of the payout.
    ///
    /// Accounts:
    ///   0. `[signer, writable]` Caller (pays rent for the loss record)
    ///   1. `[writable]` InsurancePool PDA
    ///   2. `[writable]` Strategy account (written only when it is a FeeVault
    ///      of this program whose vault token is the payout recipient)
    ///   3. `[writable]` LossRecord PDA for the current epoch (to be created)
    ///   4. `[writable]` Pool token account (source)
    ///   5. `[writable]` Payout recipient token account
    ///   6. `[writable]` Caller token account (reward)
    ///   7. `[]` Pool authority PDA
    ///   8. `[]` Token program
    ///   9. `[]` System program
    ///  10. `[]` Clock sysvar
    TriggerLoss,

    /// Admin updates loss parameters.
    ///
    /// Accounts:
    ///   0. `[signer]` Admin
    ///   1. `[writable]` InsurancePool PDA
    SetParameters {
        deductible_bps: u16,
        min_liquidity_floor: u64,
        checkpoint_maturity_secs: u64,
        caller_reward_bps: u16,
    },

    /// Create a glue collateral token.
    ///
    /// Accounts:
    ///   0. `[signer, writable]` Admin (pays rent)
    ///   1. `[]` Glue id (any key; seeds the glue PDA)
    ///   2. `[writable]` GlueToken PDA (to be created)
    ///   3. `[writable]` Collateral token account (allocated, uninitialized; authority = glue_auth PDA)
    ///   4. `[]` Glue authority PDA
    ///   5. `[]` Asset mint
    ///   6. `[]` Minter
    ///   7. `[]` Token program
    ///   8. `[]` System program
    ///   9. `[]` Rent sysvar
    InitGlue,

    /// Add collateral without minting. Anyone may call.
    ///
    /// Accounts:
    ///   0. `[signer]` Depositor
    ///   1. `[writable]` GlueToken PDA
    ///   2. `[writable]` Depositor token account
    ///   3. `[writable]` Collateral token account
    ///   4. `[]` Token program
    GlueDeposit { amount: u64 },

    /// Mint glue units against new collateral. Minter or admin only.
    ///
    /// Accounts:
    ///   0. `[signer, writable]` Minter or admin (pays rent)
    ///   1. `[writable]` GlueToken PDA
    ///   2. `[writable]` Minter token account (source)
    ///   3. `[writable]` Collateral token account
    ///   4. `[]` Recipient
    ///   5. `[writable]` GlueBalance PDA of the recipient (created if needed)
    ///   6. `[]` Token program
    ///   7. `[]` System program
    GlueMint { amount: u64 },

    /// Burn glue units for their share of the collateral.
    ///
    /// Accounts:
    ///   0. `[signer]` Holder
    ///   1. `[writable]` GlueToken PDA
    ///   2. `[writable]` GlueBalance PDA
    ///   3. `[writable]` Collateral token account (source)
    ///   4. `[writable]` Recipient token account
    ///   5. `[]` Glue authority PDA
    ///   6. `[]` Token program
    GlueRedeem { units: u64 },

    /// Create the registry singleton; the signer becomes registrar.
    ///
    /// Accounts:
    ///   0. `[signer, writable]` Registrar (pays rent)
    ///   1. `[writable]` Registry PDA (to be created)
    ///   2. `[]` System program
    InitRegistry,

    /// Record the `(vault, pool)` pair. Registrar only, write-once.
    ///
    /// Accounts:
    ///   0. `[signer, writable]` Registrar (pays rent)
    ///   1. `[writable]` Registry PDA
    ///   2. `[]` FeeVault PDA
    ///   3. `[]` InsurancePool PDA
    ///   4. `[writable]` RegistryEntry PDA (to be created)
    ///   5. `[]` System program
    ///   6. `[]` Clock sysvar
    RegisterVault,
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64, ProgramError> {
    data.get(offset..offset + 8)
        .and_then(|s| s.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or(ProgramError::InvalidInstructionData)
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, ProgramError> {
    data.get(offset..offset + 2)
        .and_then(|s| s.try_into().ok())
        .map(u16::from_le_bytes)
        .ok_or(ProgramError::InvalidInstructionData)
}

fn read_opt_u16(data: &[u8], offset: usize) -> Result<Option<u16>, ProgramError> {
    let flag = *data.get(offset).ok_or(ProgramError::InvalidInstructionData)?;
    let value = read_u16(data, offset + 1)?;
    Ok(if flag != 0 { Some(value) } else { None })
}

impl InsuranceInstruction {
    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        let (&tag, rest) = data.split_first().ok_or(ProgramError::InvalidInstructionData)?;

        match tag {
            0 => {
                // InitVault: mgmt(2) + perf(2) + split(2) + sink_kind(1)
                let sink_kind = *rest.get(6).ok_or(ProgramError::InvalidInstructionData)?;
                Ok(Self::InitVault {
                    management_fee_bps: read_u16(rest, 0)?,
                    performance_fee_bps: read_u16(rest, 2)?,
                    insurance_split_bps: read_u16(rest, 4)?,
                    sink_kind,
                })
            }
            1 => Ok(Self::Deposit { amount: read_u64(rest, 0)? }),
            2 => Ok(Self::Withdraw { shares: read_u64(rest, 0)? }),
            3 => Ok(Self::AccrueFees),
            4 => Ok(Self::Report {
                gain: read_u64(rest, 0)?,
                loss: read_u64(rest, 8)?,
            }),
            5 => {
                // UpdateVaultConfig: (flag(1) + bps(2)) x 3
                Ok(Self::UpdateVaultConfig {
                    management_fee_bps: read_opt_u16(rest, 0)?,
                    performance_fee_bps: read_opt_u16(rest, 3)?,
                    insurance_split_bps: read_opt_u16(rest, 6)?,
                })
            }
            6 => {
                // InitPool: deductible(2) + floor(8) + maturity(8) + reward(2) + cooldown(8) + interval(8)
                Ok(Self::InitPool {
                    deductible_bps: read_u16(rest, 0)?,
                    min_liquidity_floor: read_u64(rest, 2)?,
                    checkpoint_maturity_secs: read_u64(rest, 10)?,
                    caller_reward_bps: read_u16(rest, 18)?,
                    cooldown_secs: read_u64(rest, 20)?,
                    min_checkpoint_interval: read_u64(rest, 28)?,
                })
            }
            7 => Ok(Self::Stake { amount: read_u64(rest, 0)? }),
            8 => Ok(Self::Unstake { shares: read_u64(rest, 0)? }),
            9 => Ok(Self::RecordPremium { amount: read_u64(rest, 0)? }),
            10 => Ok(Self::Claim),
            11 => Ok(Self::UpdateCheckpoint),
            12 => Ok(Self::TriggerLoss),
            13 => {
                // SetParameters: deductible(2) + floor(8) + maturity(8) + reward(2)
                Ok(Self::SetParameters {
                    deductible_bps: read_u16(rest, 0)?,
                    min_liquidity_floor: read_u64(rest, 2)?,
                    checkpoint_maturity_secs: read_u64(rest, 10)?,
                    caller_reward_bps: read_u16(rest, 18)?,
                })
            }
            14 => Ok(Self::InitGlue),
            15 => Ok(Self::GlueDeposit { amount: read_u64(rest, 0)? }),
            16 => Ok(Self::GlueMint { amount: read_u64(rest, 0)? }),
            17 => Ok(Self::GlueRedeem { units: read_u64(rest, 0)? }),
            18 => Ok(Self::InitRegistry),
            19 => Ok(Self::RegisterVault),
            _ => Err(ProgramError::InvalidInstructionData),
        }
    }
}
