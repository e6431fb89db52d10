//! Credit admission
//!
//! Before anything is submitted, the caller's balance must cover the whole
//! batch. The balance is read fresh on every call; an `AdmissionPass` is the
//! proof the check happened and is consumed by exactly one dispatch.

use prism_core::{PrismError, Result, UserId};
use std::collections::HashMap;
use std::sync::Mutex;

/// Read-only view of the external credit ledger
pub trait CreditBalance: Send + Sync {
    fn remaining_credits(&self, user_id: &UserId) -> Result<u32>;
}

/// Fixed balances, e.g. from the `[credits]` config table
#[derive(Debug, Default)]
pub struct StaticCredits {
    balances: Mutex<HashMap<UserId, u32>>,
}

impl StaticCredits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(balances: &HashMap<String, u32>) -> Self {
        let credits = Self::new();
        for (user, amount) in balances {
            credits.set(&UserId::from(user.as_str()), *amount);
        }
        credits
    }

    pub fn with_balance(self, user_id: &UserId, amount: u32) -> Self {
        self.set(user_id, amount);
        self
    }

    pub fn set(&self, user_id: &UserId, amount: u32) {
        let mut balances = self
            .balances
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        balances.insert(user_id.clone(), amount);
    }
}

impl CreditBalance for StaticCredits {
    fn remaining_credits(&self, user_id: &UserId) -> Result<u32> {
        let balances = self
            .balances
            .lock()
            .map_err(|_| PrismError::LedgerError("credit table lock poisoned".to_string()))?;
        Ok(balances.get(user_id).copied().unwrap_or(0))
    }
}

/// Proof that `user_id` could afford `total_cost` at admission time.
///
/// Deliberately neither `Clone` nor constructible outside this module.
#[derive(Debug)]
pub struct AdmissionPass {
    user_id: UserId,
    total_cost: u32,
}

impl AdmissionPass {
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn total_cost(&self) -> u32 {
        self.total_cost
    }
}

/// Checks balances against batch cost
pub struct AdmissionGate<'a> {
    credits: &'a dyn CreditBalance,
}

impl<'a> AdmissionGate<'a> {
    pub fn new(credits: &'a dyn CreditBalance) -> Self {
        Self { credits }
    }

    pub fn admit(&self, user_id: &UserId, total_cost: u32) -> Result<AdmissionPass> {
        let available = self.credits.remaining_credits(user_id)?;
        if available < total_cost {
            tracing::info!(
                user_id = %user_id,
                required = total_cost,
                available,
                "admission refused"
            );
            return Err(PrismError::InsufficientCredits {
                required: total_cost,
                available,
            });
        }
        Ok(AdmissionPass {
            user_id: user_id.clone(),
            total_cost,
        })
    }
}
