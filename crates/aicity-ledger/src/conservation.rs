//! The conservation law and transaction-log replay.
//!
//! Conservation: at any point, the sum of all agent balances plus the vault
//! balance equals total supply. Replay: starting from a zero state and
//! applying every transaction in commit order reproduces the current
//! balances and vault exactly. Both are tested properties of the system.

use std::collections::BTreeMap;

use aicity_types::{AgentId, LedgerParty, Transaction, TxKind, VaultState};

use crate::LedgerError;

/// Balances and vault counters reconstructed from a transaction log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayState {
    pub balances: BTreeMap<AgentId, u64>,
    pub vault: VaultState,
}

/// Verify `sum(balances) + vault_balance == total_supply` and that the
/// circulating counter agrees with the balances.
///
/// # Errors
///
/// Returns [`LedgerError::InvariantViolation`] describing the imbalance.
pub fn verify_conservation(
    balances: &BTreeMap<AgentId, u64>,
    vault: VaultState,
) -> Result<(), LedgerError> {
    let circulating: u64 = balances.values().sum();
    if circulating != vault.circulating {
        return Err(LedgerError::InvariantViolation(format!(
            "circulating counter {} does not match balance sum {}",
            vault.circulating, circulating
        )));
    }
    let accounted = circulating
        .checked_add(vault.vault_balance)
        .ok_or_else(|| LedgerError::InvariantViolation(String::from("supply overflow")))?;
    if accounted != vault.total_supply {
        return Err(LedgerError::InvariantViolation(format!(
            "balances + vault = {} but total supply is {}",
            accounted, vault.total_supply
        )));
    }
    Ok(())
}

/// Replay a transaction log from a zero state.
///
/// # Errors
///
/// Returns [`LedgerError::InvariantViolation`] if any transaction would
/// drive a balance or counter negative, or if the final state fails the
/// conservation check.
pub fn replay(transactions: &[Transaction]) -> Result<ReplayState, LedgerError> {
    let mut balances: BTreeMap<AgentId, u64> = BTreeMap::new();
    let mut vault = VaultState {
        total_supply: 0,
        circulating: 0,
        vault_balance: 0,
    };

    for tx in transactions {
        debit(&mut balances, &mut vault, tx)?;
        credit(&mut balances, &mut vault, tx);
        // Supply changes only at the sink boundary.
        match tx.kind {
            TxKind::Mint if tx.from == LedgerParty::Sink => {
                vault.total_supply = vault
                    .total_supply
                    .checked_add(tx.amount)
                    .ok_or_else(|| {
                        LedgerError::InvariantViolation(String::from("supply overflow in replay"))
                    })?;
            }
            TxKind::Burn => {
                vault.total_supply = vault.total_supply.checked_sub(tx.amount).ok_or_else(|| {
                    LedgerError::InvariantViolation(format!(
                        "burn of {} exceeds supply at tx {}",
                        tx.amount, tx.id
                    ))
                })?;
            }
            _ => {}
        }
    }

    verify_conservation(&balances, vault)?;
    Ok(ReplayState { balances, vault })
}

fn debit(
    balances: &mut BTreeMap<AgentId, u64>,
    vault: &mut VaultState,
    tx: &Transaction,
) -> Result<(), LedgerError> {
    match tx.from {
        LedgerParty::Agent(id) => {
            let balance = balances.entry(id).or_insert(0);
            *balance = balance.checked_sub(tx.amount).ok_or_else(|| {
                LedgerError::InvariantViolation(format!(
                    "tx {} overdraws agent {}",
                    tx.id, id
                ))
            })?;
            vault.circulating = vault.circulating.checked_sub(tx.amount).ok_or_else(|| {
                LedgerError::InvariantViolation(format!("tx {} underflows circulating", tx.id))
            })?;
        }
        LedgerParty::Vault => {
            vault.vault_balance = vault.vault_balance.checked_sub(tx.amount).ok_or_else(|| {
                LedgerError::InvariantViolation(format!("tx {} overdraws the vault", tx.id))
            })?;
        }
        LedgerParty::Sink => {}
    }
    Ok(())
}

fn credit(balances: &mut BTreeMap<AgentId, u64>, vault: &mut VaultState, tx: &Transaction) {
    match tx.to {
        LedgerParty::Agent(id) => {
            *balances.entry(id).or_insert(0) += tx.amount;
            vault.circulating += tx.amount;
        }
        LedgerParty::Vault => {
            vault.vault_balance += tx.amount;
        }
        LedgerParty::Sink => {}
    }
}
