//! Credit redemption ledger.
//!
//! The ledger caches each user's balance as last confirmed by the remote
//! authority and runs redemption attempts against it, one at a time per
//! user. Local state is only replaced by what the authority confirms.
//! Also supports an async stream of redemption commands.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::amount::{ConversionRate, Credits};
use crate::authority::CreditsAuthority;
use crate::model::{
    Balance, Redemption, RedemptionCommand, RedemptionInput, RedemptionResult, UserId,
};

mod convert;
pub use convert::{apply_redemption, check_request, compute_redemption, max_redeemable};

mod state;
pub use state::{Account, RedemptionPhase};

mod error;
pub use error::{AuthorityError, LedgerError, RedemptionError};

/// The redemption ledger.
///
/// Caches one [`Account`] per synchronized user.
pub struct Ledger<A> {
    authority: A,
    rate: ConversionRate,
    accounts: Mutex<HashMap<UserId, Account>>,
}

/// Public API
impl<A: CreditsAuthority> Ledger<A> {
    pub fn new(authority: A) -> Self {
        Self {
            authority,
            rate: ConversionRate::SKILLCOIN,
            accounts: Mutex::new(HashMap::new()),
        }
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }

    pub fn rate(&self) -> ConversionRate {
        self.rate
    }

    /// Run the ledger over the given command stream.
    pub async fn run(&self, mut stream: impl Stream<Item = RedemptionCommand> + Unpin) {
        while let Some(command) = stream.next().await {
            // failures are logged in `apply` and must not stop the ledger
            let _ = self.apply(command).await;
        }
    }

    /// Apply a single redemption command, logging its outcome.
    pub async fn apply(&self, command: RedemptionCommand) -> Result<Redemption, LedgerError> {
        let RedemptionCommand { user, amount } = command;
        let result = self.redeem(&user, &amount).await;
        Self::log_result(&user, &amount, &result);
        result
    }

    /// Fetch the balance of `user` from the authority and replace the cached one.
    pub async fn sync(&self, user: &UserId) -> Result<Balance, AuthorityError> {
        let fetched = match self.authority.fetch_balance(user).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(user = %user, reason = %e, "balance sync failed");
                return Err(e);
            }
        };

        let mut accounts = self.accounts.lock();
        match accounts.get_mut(user) {
            Some(account) => {
                if account.balance() != fetched {
                    info!(
                        user = %user,
                        cached_credits = %account.balance().credits,
                        credits = %fetched.credits,
                        "reconciled drifted balance"
                    );
                }
                account.reconcile(fetched);
            }
            None => {
                accounts.insert(user.clone(), Account::new(fetched));
            }
        }
        Ok(fetched)
    }

    /// Cached balance of `user`, if synchronized.
    pub fn balance(&self, user: &UserId) -> Option<Balance> {
        self.accounts.lock().get(user).map(Account::balance)
    }

    pub fn phase(&self, user: &UserId) -> Option<RedemptionPhase> {
        self.accounts.lock().get(user).map(Account::phase)
    }

    /// Cached balances of all synchronized users, ordered by user id.
    pub fn accounts(&self) -> Vec<(UserId, Balance)> {
        let mut all: Vec<_> = self
            .accounts
            .lock()
            .iter()
            .map(|(user, account)| (user.clone(), account.balance()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Amount the "max" shortcut would redeem for `user`, if synchronized.
    pub fn max_redeemable(&self, user: &UserId) -> Option<Credits> {
        self.balance(user)
            .map(|balance| max_redeemable(balance.credits, self.rate))
    }

    /// Run one redemption attempt for `user` with free-text `input`:
    /// - Parse the input and check it against the minimum
    /// - Synchronize the balance if not cached yet
    /// - Refuse if an attempt for the user is still running
    /// - Validate the request against the cached balance
    /// - Submit to the authority and adopt the confirmed balance
    ///
    /// Input that fails the balance-independent checks never reaches the
    /// authority. On any failure the cached balance is left unchanged.
    pub async fn redeem(&self, user: &UserId, input: &str) -> Result<Redemption, LedgerError> {
        let request = check_request(input, self.rate)?;

        if self.balance(user).is_none() {
            self.sync(user).await?;
        }

        let result = {
            let mut accounts = self.accounts.lock();
            let account = accounts
                .get_mut(user)
                .ok_or_else(|| AuthorityError::UnknownUser(user.clone()))?;

            if !account.begin() {
                return Err(RedemptionError::AttemptInFlight(user.clone()).into());
            }

            match self.resolve(account.balance().credits, request) {
                Ok(result) => {
                    account.submit();
                    result
                }
                Err(e) => {
                    account.abandon();
                    return Err(e.into());
                }
            }
        };

        let mut in_flight = InFlight::new(&self.accounts, user);
        let outcome = apply_redemption(&self.authority, user, &result).await;
        in_flight.finish(outcome.as_ref().ok().copied());

        let balance = outcome?;
        Ok(Redemption { result, balance })
    }
}

/// Private API
impl<A: CreditsAuthority> Ledger<A> {
    /// Apply the balance-dependent checks to an already checked request.
    fn resolve(
        &self,
        credits: Credits,
        request: RedemptionInput,
    ) -> Result<RedemptionResult, RedemptionError> {
        let requested = match request {
            RedemptionInput::Amount(amount) => amount,
            RedemptionInput::Max => {
                let max = max_redeemable(credits, self.rate);
                if max.is_zero() {
                    return Err(RedemptionError::BelowMinimum {
                        requested: credits,
                        minimum: self.rate.credits_per_coin(),
                    });
                }
                max
            }
        };
        compute_redemption(credits, requested, self.rate)
    }

    /// Small helper to log `apply` results
    fn log_result(user: &UserId, amount: &str, result: &Result<Redemption, LedgerError>) {
        match result {
            Ok(redemption) => {
                info!(
                    user = %user,
                    amount,
                    coins = %redemption.result.coins_granted,
                    deducted = %redemption.result.credits_deducted,
                    credits = %redemption.balance.credits,
                    "redemption applied"
                );
            }
            Err(e) => {
                info!(user = %user, amount, reason = %e, "redemption skipped");
            }
        }
    }
}

/// Tracks a submission until the authority answers.
///
/// Dropped before `finish`, it marks the attempt rejected.
struct InFlight<'a> {
    accounts: &'a Mutex<HashMap<UserId, Account>>,
    user: &'a UserId,
    done: bool,
}

impl<'a> InFlight<'a> {
    fn new(accounts: &'a Mutex<HashMap<UserId, Account>>, user: &'a UserId) -> Self {
        Self {
            accounts,
            user,
            done: false,
        }
    }

    fn finish(&mut self, confirmed: Option<Balance>) {
        if let Some(account) = self.accounts.lock().get_mut(self.user) {
            match confirmed {
                Some(balance) => account.confirm(balance),
                None => account.reject(),
            }
        }
        self.done = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Some(account) = self.accounts.lock().get_mut(self.user) {
            warn!(
                user = %self.user,
                "redemption abandoned while submitting; re-sync before trusting the balance"
            );
            account.reject();
        }
    }
}
