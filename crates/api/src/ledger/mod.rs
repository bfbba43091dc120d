// Path: crates/api/src/ledger/mod.rs
//! Credit-ledger contract: the operations the core calls for stake,
//! escrow, and rewards. Balances and unbonding live behind this interface.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use swarm_types::error::LedgerError;
use tracing::debug;

/// A single append-only audit entry.
#[derive(Debug, Clone)]
pub struct LedgerOp {
    pub account: String,
    pub kind: String,
    pub amount: u64,
    pub detail: Value,
}

#[async_trait]
pub trait CreditLedger: Send + Sync {
    async fn get_balance(&self, account: &str) -> Result<u64, LedgerError>;

    async fn transfer(&self, from: &str, to: &str, amount: u64) -> Result<(), LedgerError>;

    /// Lock funds under an escrow id.
    async fn escrow(&self, account: &str, amount: u64, escrow_id: &str)
        -> Result<(), LedgerError>;

    /// Pay escrowed funds out to `to`.
    async fn release_escrow(&self, escrow_id: &str, to: &str) -> Result<(), LedgerError>;

    /// Return escrowed funds to the original account.
    async fn cancel_escrow(&self, escrow_id: &str) -> Result<(), LedgerError>;

    /// Most recent operations, optionally filtered by account.
    async fn audit_trail(&self, account: Option<&str>, limit: usize) -> Vec<LedgerOp>;
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<String, u64>,
    escrows: HashMap<String, (String, u64)>,
    ops: Vec<LedgerOp>,
}

/// In-memory ledger used by single-host nodes and tests.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account balance; test and genesis convenience.
    pub fn credit(&self, account: &str, amount: u64) {
        if let Ok(mut state) = self.state.lock() {
            *state.balances.entry(account.to_string()).or_insert(0) += amount;
            state.ops.push(LedgerOp {
                account: account.to_string(),
                kind: "credit".into(),
                amount,
                detail: json!({}),
            });
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut LedgerState) -> R) -> R {
        match self.state.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl CreditLedger for MemoryLedger {
    async fn get_balance(&self, account: &str) -> Result<u64, LedgerError> {
        self.with_state(|s| {
            s.balances
                .get(account)
                .copied()
                .ok_or_else(|| LedgerError::UnknownAccount(account.to_string()))
        })
    }

    async fn transfer(&self, from: &str, to: &str, amount: u64) -> Result<(), LedgerError> {
        self.with_state(|s| {
            let balance = s
                .balances
                .get(from)
                .copied()
                .ok_or_else(|| LedgerError::UnknownAccount(from.to_string()))?;
            if balance < amount {
                return Err(LedgerError::InsufficientFunds {
                    balance,
                    requested: amount,
                });
            }
            *s.balances.entry(from.to_string()).or_insert(0) -= amount;
            *s.balances.entry(to.to_string()).or_insert(0) += amount;
            s.ops.push(LedgerOp {
                account: from.to_string(),
                kind: "transfer".into(),
                amount,
                detail: json!({"to": to}),
            });
            debug!(target: "ledger", from, to, amount, "transfer");
            Ok(())
        })
    }

    async fn escrow(
        &self,
        account: &str,
        amount: u64,
        escrow_id: &str,
    ) -> Result<(), LedgerError> {
        self.with_state(|s| {
            let balance = s
                .balances
                .get(account)
                .copied()
                .ok_or_else(|| LedgerError::UnknownAccount(account.to_string()))?;
            if balance < amount {
                return Err(LedgerError::InsufficientFunds {
                    balance,
                    requested: amount,
                });
            }
            *s.balances.entry(account.to_string()).or_insert(0) -= amount;
            s.escrows
                .insert(escrow_id.to_string(), (account.to_string(), amount));
            s.ops.push(LedgerOp {
                account: account.to_string(),
                kind: "escrow".into(),
                amount,
                detail: json!({"escrow_id": escrow_id}),
            });
            Ok(())
        })
    }

    async fn release_escrow(&self, escrow_id: &str, to: &str) -> Result<(), LedgerError> {
        self.with_state(|s| {
            let (_, amount) = s
                .escrows
                .remove(escrow_id)
                .ok_or_else(|| LedgerError::EscrowNotFound(escrow_id.to_string()))?;
            *s.balances.entry(to.to_string()).or_insert(0) += amount;
            s.ops.push(LedgerOp {
                account: to.to_string(),
                kind: "escrow_release".into(),
                amount,
                detail: json!({"escrow_id": escrow_id}),
            });
            Ok(())
        })
    }

    async fn cancel_escrow(&self, escrow_id: &str) -> Result<(), LedgerError> {
        self.with_state(|s| {
            let (account, amount) = s
                .escrows
                .remove(escrow_id)
                .ok_or_else(|| LedgerError::EscrowNotFound(escrow_id.to_string()))?;
            *s.balances.entry(account.clone()).or_insert(0) += amount;
            s.ops.push(LedgerOp {
                account,
                kind: "escrow_cancel".into(),
                amount,
                detail: json!({"escrow_id": escrow_id}),
            });
            Ok(())
        })
    }

    async fn audit_trail(&self, account: Option<&str>, limit: usize) -> Vec<LedgerOp> {
        self.with_state(|s| {
            s.ops
                .iter()
                .rev()
                .filter(|op| account.map_or(true, |a| op.account == a))
                .take(limit)
                .cloned()
                .collect()
        })
    }
}
