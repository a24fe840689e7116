//! The remote credits authority holding canonical balances.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::amount::ConversionRate;
use crate::ledger::AuthorityError;
use crate::model::{Balance, RedemptionSubmission, UserId};

mod http;
pub use http::HttpAuthority;

/// Source of truth for user balances.
#[async_trait]
pub trait CreditsAuthority: Send + Sync {
    /// Fetch the current balance of `user`.
    async fn fetch_balance(&self, user: &UserId) -> Result<Balance, AuthorityError>;

    /// Apply a redemption and return the confirmed balance.
    async fn submit_redemption(
        &self,
        submission: &RedemptionSubmission,
    ) -> Result<Balance, AuthorityError>;
}

#[async_trait]
impl<T: CreditsAuthority + ?Sized> CreditsAuthority for Arc<T> {
    async fn fetch_balance(&self, user: &UserId) -> Result<Balance, AuthorityError> {
        (**self).fetch_balance(user).await
    }

    async fn submit_redemption(
        &self,
        submission: &RedemptionSubmission,
    ) -> Result<Balance, AuthorityError> {
        (**self).submit_redemption(submission).await
    }
}

/// Process-local authority, used when no remote API is configured.
///
/// Submissions are checked against the balance it holds, so a deduction
/// computed from a stale local balance is rejected.
#[derive(Debug)]
pub struct InMemoryAuthority {
    rate: ConversionRate,
    balances: Mutex<HashMap<UserId, Balance>>,
}

impl InMemoryAuthority {
    pub fn new() -> Self {
        Self {
            rate: ConversionRate::SKILLCOIN,
            balances: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_balances(balances: impl IntoIterator<Item = (UserId, Balance)>) -> Self {
        let authority = Self::new();
        authority.balances.lock().extend(balances);
        authority
    }

    /// Set the canonical balance of `user`, replacing any previous one.
    pub fn insert(&self, user: UserId, balance: Balance) {
        self.balances.lock().insert(user, balance);
    }

    pub fn balance(&self, user: &UserId) -> Option<Balance> {
        self.balances.lock().get(user).copied()
    }

    fn apply(&self, submission: &RedemptionSubmission) -> Result<Balance, AuthorityError> {
        let mut balances = self.balances.lock();
        let balance = balances
            .get_mut(&submission.user_id)
            .ok_or_else(|| AuthorityError::UnknownUser(submission.user_id.clone()))?;

        if submission.coins_granted.get() == 0 {
            return Err(AuthorityError::Rejected("no coins requested".into()));
        }
        if self.rate.credits_for(submission.coins_granted) != Some(submission.credits_deducted) {
            return Err(AuthorityError::Rejected(format!(
                "deduction of {} credits does not match {} coins at {}",
                submission.credits_deducted, submission.coins_granted, self.rate
            )));
        }

        let credits = balance
            .credits
            .checked_sub(submission.credits_deducted)
            .ok_or_else(|| {
                AuthorityError::Rejected(format!(
                    "balance changed: {} credits held, {} requested",
                    balance.credits, submission.credits_deducted
                ))
            })?;
        let coins = balance
            .coins
            .checked_add(submission.coins_granted)
            .ok_or_else(|| AuthorityError::Rejected("coin balance overflow".into()))?;

        *balance = Balance { credits, coins };
        Ok(*balance)
    }
}

impl Default for InMemoryAuthority {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CreditsAuthority for InMemoryAuthority {
    async fn fetch_balance(&self, user: &UserId) -> Result<Balance, AuthorityError> {
        self.balance(user)
            .ok_or_else(|| AuthorityError::UnknownUser(user.clone()))
    }

    async fn submit_redemption(
        &self,
        submission: &RedemptionSubmission,
    ) -> Result<Balance, AuthorityError> {
        let confirmed = self.apply(submission)?;
        debug!(
            user = %submission.user_id,
            credits = %confirmed.credits,
            coins = %confirmed.coins,
            "in-memory redemption applied"
        );
        Ok(confirmed)
    }
}
