//! The [`TokenLedger`]: balances, the vault, and every operation that moves
//! tokens.
//!
//! All quantities are integral. Earnings are taxed into the vault and capped
//! by the wealth-cap rule; transfers respect the minimum balance floor; the
//! daily burn destroys supply. Each successful operation appends exactly one
//! [`Transaction`].

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use aicity_types::{
    AgentId, LedgerParty, Transaction, TransactionId, TxKind, VaultState,
};

use crate::LedgerError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Economic constants, read once from the city configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Tokens granted to a newly registered citizen, from the vault.
    pub starting_balance: u64,
    /// Fraction of every gross earn withheld to the vault.
    pub tax_rate: Decimal,
    /// No agent may hold more than this fraction of total supply.
    pub wealth_cap_fraction: Decimal,
    /// Transfers may not push the source below this balance.
    pub transfer_floor: u64,
    /// Unconditional daily existence cost.
    pub daily_burn: u64,
    /// Authorized mints per rolling period may not exceed this fraction of
    /// supply.
    pub mint_period_cap_fraction: Decimal,
    /// Length of the mint period in days.
    pub mint_period_days: u32,
    /// The operator key that authorizes minting.
    pub mint_key: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: 1000,
            tax_rate: Decimal::new(10, 2),
            wealth_cap_fraction: Decimal::new(5, 2),
            transfer_floor: 50,
            daily_burn: 100,
            mint_period_cap_fraction: Decimal::new(10, 2),
            mint_period_days: 30,
            mint_key: String::new(),
        }
    }
}

/// Proof of mint authorization, held only by the designated operator.
#[derive(Debug, Clone)]
pub struct MintAuthority {
    /// The operator's name, recorded on the mint transaction.
    pub operator: String,
    /// The secret key checked against [`LedgerConfig::mint_key`].
    pub key: String,
}

// ---------------------------------------------------------------------------
// Operation outcomes
// ---------------------------------------------------------------------------

/// Result of an [`TokenLedger::earn`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarnOutcome {
    /// Tokens actually credited after tax, cap, and vault clamping.
    pub net: u64,
    /// Tax withheld (stays in the vault).
    pub tax: u64,
    /// Whether the wealth cap reduced the credit.
    pub capped: bool,
}

/// Result of a [`TokenLedger::burn_daily`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurnOutcome {
    /// Tokens destroyed.
    pub burned: u64,
    /// The burn drove the balance to zero: the agent starves.
    pub starved: bool,
}

// ---------------------------------------------------------------------------
// TokenLedger
// ---------------------------------------------------------------------------

/// Agent balances, the vault, and the immutable transaction log.
#[derive(Debug, Clone)]
pub struct TokenLedger {
    config: LedgerConfig,
    balances: BTreeMap<AgentId, u64>,
    vault: VaultState,
    transactions: Vec<Transaction>,
}

impl TokenLedger {
    /// Create a ledger with the entire supply in the vault.
    ///
    /// Writes the genesis mint transaction so that replaying the log from a
    /// zero state reproduces this ledger exactly.
    pub fn new(config: LedgerConfig, total_supply: u64) -> Self {
        let mut ledger = Self {
            config,
            balances: BTreeMap::new(),
            vault: VaultState {
                total_supply: 0,
                circulating: 0,
                vault_balance: 0,
            },
            transactions: Vec::new(),
        };
        ledger.vault.total_supply = total_supply;
        ledger.vault.vault_balance = total_supply;
        ledger.push_tx(
            0,
            LedgerParty::Sink,
            LedgerParty::Vault,
            total_supply,
            0,
            "genesis",
            TxKind::Mint,
        );
        ledger
    }

    /// Rebuild a ledger from a persisted transaction log.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvariantViolation`] if the log does not
    /// reconcile.
    pub fn from_transactions(
        config: LedgerConfig,
        transactions: Vec<Transaction>,
    ) -> Result<Self, LedgerError> {
        let replayed = crate::conservation::replay(&transactions)?;
        Ok(Self {
            config,
            balances: replayed.balances,
            vault: replayed.vault,
            transactions,
        })
    }

    /// The ledger configuration.
    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// An agent's current balance. Zero for unregistered agents.
    pub fn balance(&self, agent: AgentId) -> u64 {
        self.balances.get(&agent).copied().unwrap_or(0)
    }

    /// Snapshot of the vault counters.
    pub const fn vault(&self) -> VaultState {
        self.vault
    }

    /// All transactions, in commit order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Transactions committed on the given day.
    pub fn transactions_for_day(&self, day: u32) -> Vec<&Transaction> {
        self.transactions.iter().filter(|t| t.day == day).collect()
    }

    /// Transactions in a day window, for case-file evidence.
    pub fn transactions_in_window(&self, from_day: u32, to_day: u32) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|t| t.day >= from_day && t.day <= to_day)
            .collect()
    }

    /// The per-agent wealth ceiling under the 5% cap.
    pub fn wealth_cap(&self) -> u64 {
        fraction_of(self.vault.total_supply, self.config.wealth_cap_fraction)
    }

    /// The richest registered agents, wealthiest first.
    pub fn richest(&self, limit: usize) -> Vec<(AgentId, u64)> {
        let mut all: Vec<(AgentId, u64)> =
            self.balances.iter().map(|(id, b)| (*id, *b)).collect();
        all.sort_by(|x, y| y.1.cmp(&x.1).then(x.0.cmp(&y.0)));
        all.truncate(limit);
        all
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Register a new citizen with the starting balance, from the vault.
    ///
    /// Registration grants are not wealth-capped: the cap governs income,
    /// not the founding grant.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientVault`] when the vault cannot fund
    /// the grant.
    pub fn register(&mut self, day: u32, agent: AgentId) -> Result<(), LedgerError> {
        if self.balances.contains_key(&agent) {
            return Ok(());
        }
        let grant = self.config.starting_balance;
        if self.vault.vault_balance < grant {
            return Err(LedgerError::InsufficientVault {
                needed: grant,
                available: self.vault.vault_balance,
            });
        }
        self.vault.vault_balance -= grant;
        self.vault.circulating += grant;
        self.balances.insert(agent, grant);
        self.push_tx(
            day,
            LedgerParty::Vault,
            LedgerParty::Agent(agent),
            grant,
            0,
            "agent_birth",
            TxKind::Mint,
        );
        self.check_conservation()
    }

    /// Credit earnings to an agent, withholding tax and enforcing the
    /// wealth cap.
    ///
    /// The net is drawn from the vault; the withheld tax simply never leaves
    /// it. If the cap would be breached, the net is reduced to exactly fit
    /// and the excess is discarded (it stays in the vault, unminted and
    /// unrefunded).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownAgent`] for unregistered agents.
    pub fn earn(
        &mut self,
        day: u32,
        agent: AgentId,
        gross: u64,
        reason: &str,
    ) -> Result<EarnOutcome, LedgerError> {
        if !self.balances.contains_key(&agent) {
            return Err(LedgerError::UnknownAgent(agent));
        }
        if gross == 0 {
            return Ok(EarnOutcome {
                net: 0,
                tax: 0,
                capped: false,
            });
        }

        let tax = fraction_of(gross, self.config.tax_rate);
        let mut net = gross - tax;

        let cap = self.wealth_cap();
        let balance = self.balance(agent);
        let mut capped = false;
        if balance.saturating_add(net) > cap {
            net = cap.saturating_sub(balance);
            capped = true;
            warn!(agent = %agent, cap, "earn reduced by the wealth cap");
        }

        // The vault is the source of all income; an empty vault means a dry
        // economy.
        if net > self.vault.vault_balance {
            net = self.vault.vault_balance;
        }

        if net == 0 {
            return Ok(EarnOutcome { net: 0, tax, capped });
        }

        self.vault.vault_balance -= net;
        self.vault.circulating += net;
        if let Some(b) = self.balances.get_mut(&agent) {
            *b += net;
        }
        self.push_tx(
            day,
            LedgerParty::Vault,
            LedgerParty::Agent(agent),
            net,
            tax,
            reason,
            TxKind::Earn,
        );
        debug!(agent = %agent, net, tax, reason, "earn");
        self.check_conservation()?;
        Ok(EarnOutcome { net, tax, capped })
    }

    /// Debit an agent in favor of the vault.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientFunds`] when the balance is short.
    pub fn spend(
        &mut self,
        day: u32,
        agent: AgentId,
        amount: u64,
        reason: &str,
    ) -> Result<(), LedgerError> {
        let balance = self.balance(agent);
        if balance < amount {
            return Err(LedgerError::InsufficientFunds {
                agent,
                needed: amount,
                available: balance,
            });
        }
        if amount == 0 {
            return Ok(());
        }
        if let Some(b) = self.balances.get_mut(&agent) {
            *b -= amount;
        }
        self.vault.circulating -= amount;
        self.vault.vault_balance += amount;
        self.push_tx(
            day,
            LedgerParty::Agent(agent),
            LedgerParty::Vault,
            amount,
            0,
            reason,
            TxKind::Spend,
        );
        self.check_conservation()
    }

    /// Bilateral transfer, clamped so the source keeps the minimum balance
    /// floor. Returns the amount actually moved.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TransferBelowFloor`] when the clamp leaves
    /// nothing to move.
    pub fn transfer(
        &mut self,
        day: u32,
        from: AgentId,
        to: AgentId,
        amount: u64,
        reason: &str,
    ) -> Result<u64, LedgerError> {
        if !self.balances.contains_key(&to) {
            return Err(LedgerError::UnknownAgent(to));
        }
        let available = self
            .balance(from)
            .saturating_sub(self.config.transfer_floor);
        let actual = amount.min(available);
        if actual == 0 {
            return Err(LedgerError::TransferBelowFloor {
                from,
                floor: self.config.transfer_floor,
            });
        }
        if let Some(b) = self.balances.get_mut(&from) {
            *b -= actual;
        }
        if let Some(b) = self.balances.get_mut(&to) {
            *b += actual;
        }
        self.push_tx(
            day,
            LedgerParty::Agent(from),
            LedgerParty::Agent(to),
            actual,
            0,
            reason,
            TxKind::Transfer,
        );
        debug!(from = %from, to = %to, actual, reason, "transfer");
        self.check_conservation()?;
        Ok(actual)
    }

    /// Apply the daily existence cost. Burned tokens leave supply entirely
    /// (the sink, not the vault). A balance reaching zero starves the agent.
    pub fn burn_daily(&mut self, day: u32, agent: AgentId) -> Result<BurnOutcome, LedgerError> {
        let balance = self.balance(agent);
        let burned = self.config.daily_burn.min(balance);
        if burned > 0 {
            if let Some(b) = self.balances.get_mut(&agent) {
                *b -= burned;
            }
            self.vault.circulating -= burned;
            self.vault.total_supply -= burned;
            self.push_tx(
                day,
                LedgerParty::Agent(agent),
                LedgerParty::Sink,
                burned,
                0,
                "daily_existence_cost",
                TxKind::Burn,
            );
        }
        self.check_conservation()?;
        Ok(BurnOutcome {
            burned,
            starved: self.balance(agent) == 0,
        })
    }

    /// Court-ordered transfer to the vault, clamped to the available
    /// balance. Returns the amount actually collected.
    pub fn fine(
        &mut self,
        day: u32,
        criminal: AgentId,
        amount: u64,
        reason: &str,
    ) -> Result<u64, LedgerError> {
        let actual = amount.min(self.balance(criminal));
        if actual == 0 {
            return Ok(0);
        }
        if let Some(b) = self.balances.get_mut(&criminal) {
            *b -= actual;
        }
        self.vault.circulating -= actual;
        self.vault.vault_balance += actual;
        self.push_tx(
            day,
            LedgerParty::Agent(criminal),
            LedgerParty::Vault,
            actual,
            0,
            reason,
            TxKind::Fine,
        );
        self.check_conservation()?;
        Ok(actual)
    }

    /// Vault-funded welfare grant, clamped to what the vault holds. Returns
    /// the amount actually granted.
    pub fn welfare(
        &mut self,
        day: u32,
        agent: AgentId,
        amount: u64,
    ) -> Result<u64, LedgerError> {
        if !self.balances.contains_key(&agent) {
            return Err(LedgerError::UnknownAgent(agent));
        }
        let actual = amount.min(self.vault.vault_balance);
        if actual == 0 {
            return Ok(0);
        }
        self.vault.vault_balance -= actual;
        self.vault.circulating += actual;
        if let Some(b) = self.balances.get_mut(&agent) {
            *b += actual;
        }
        self.push_tx(
            day,
            LedgerParty::Vault,
            LedgerParty::Agent(agent),
            actual,
            0,
            "welfare_grant",
            TxKind::Welfare,
        );
        self.check_conservation()?;
        Ok(actual)
    }

    /// Mint new supply into the vault. Requires the operator key and is
    /// capped per rolling period. Returns the amount actually minted.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Unauthorized`] on a key mismatch and
    /// [`LedgerError::MintCapExhausted`] when the period cap leaves nothing.
    pub fn mint(
        &mut self,
        day: u32,
        amount: u64,
        authority: &MintAuthority,
    ) -> Result<u64, LedgerError> {
        if authority.key != self.config.mint_key || self.config.mint_key.is_empty() {
            warn!(operator = %authority.operator, "unauthorized mint attempt");
            return Err(LedgerError::Unauthorized {
                attempted_by: authority.operator.clone(),
            });
        }

        let period_cap =
            fraction_of(self.vault.total_supply, self.config.mint_period_cap_fraction);
        let window_start = day.saturating_sub(self.config.mint_period_days);
        let recent: u64 = self
            .transactions
            .iter()
            .filter(|t| {
                t.kind == TxKind::Mint
                    && t.from == LedgerParty::Sink
                    && t.day > window_start
                    && t.reason != "genesis"
            })
            .map(|t| t.amount)
            .sum();
        let remaining = period_cap.saturating_sub(recent);
        if remaining == 0 {
            return Err(LedgerError::MintCapExhausted {
                requested: amount,
                remaining,
            });
        }
        let actual = amount.min(remaining);

        self.vault.total_supply += actual;
        self.vault.vault_balance += actual;
        self.push_tx(
            day,
            LedgerParty::Sink,
            LedgerParty::Vault,
            actual,
            0,
            &format!("authorized_by_{}", authority.operator),
            TxKind::Mint,
        );
        self.check_conservation()?;
        Ok(actual)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn push_tx(
        &mut self,
        day: u32,
        from: LedgerParty,
        to: LedgerParty,
        amount: u64,
        tax_withheld: u64,
        reason: &str,
        kind: TxKind,
    ) {
        self.transactions.push(Transaction {
            id: TransactionId::new(),
            day,
            from,
            to,
            amount,
            tax_withheld,
            reason: reason.to_owned(),
            kind,
            created_at: Utc::now(),
        });
    }

    fn check_conservation(&self) -> Result<(), LedgerError> {
        crate::conservation::verify_conservation(&self.balances, self.vault)
    }
}

/// Integer floor of `total * fraction`, computed in [`Decimal`] space to
/// avoid float drift.
pub(crate) fn fraction_of(total: u64, fraction: Decimal) -> u64 {
    (Decimal::from(total) * fraction)
        .floor()
        .to_u64()
        .unwrap_or(0)
}
