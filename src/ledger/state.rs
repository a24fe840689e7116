use crate::model::Balance;

/// Where a user's current redemption attempt stands.
///
/// `Confirmed` and `Rejected` end an attempt; like `Idle` they accept a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedemptionPhase {
    #[default]
    Idle,
    Validating,
    Submitting,
    Confirmed,
    Rejected,
}

impl RedemptionPhase {
    pub fn accepts_new_attempt(self) -> bool {
        !matches!(self, RedemptionPhase::Validating | RedemptionPhase::Submitting)
    }
}

/// Locally cached view of a user's balance.
/// The remote authority remains the source of truth.
#[derive(Debug, Default)]
pub struct Account {
    balance: Balance,
    phase: RedemptionPhase,
}

impl Account {
    pub fn new(balance: Balance) -> Self {
        Self {
            balance,
            phase: RedemptionPhase::Idle,
        }
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    pub fn phase(&self) -> RedemptionPhase {
        self.phase
    }

    /// Enter `Validating`. Returns false if an attempt is already running.
    pub(crate) fn begin(&mut self) -> bool {
        if !self.phase.accepts_new_attempt() {
            return false;
        }
        self.phase = RedemptionPhase::Validating;
        true
    }

    /// Validation failed locally; nothing was submitted.
    pub(crate) fn abandon(&mut self) {
        self.phase = RedemptionPhase::Idle;
    }

    pub(crate) fn submit(&mut self) {
        self.phase = RedemptionPhase::Submitting;
    }

    /// Adopt the balance confirmed by the authority.
    pub(crate) fn confirm(&mut self, confirmed: Balance) {
        self.balance = confirmed;
        self.phase = RedemptionPhase::Confirmed;
    }

    /// The authority refused; the cached balance is left as it was.
    pub(crate) fn reject(&mut self) {
        self.phase = RedemptionPhase::Rejected;
    }

    /// Replace the cached balance with a fresh fetch.
    pub(crate) fn reconcile(&mut self, fetched: Balance) {
        self.balance = fetched;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_default() {
        let account = Account::default();
        assert_eq!(account.balance(), Balance::default());
        assert_eq!(account.phase(), RedemptionPhase::Idle);
    }

    #[test]
    fn confirmed_attempt_adopts_balance() {
        let mut account = Account::new(Balance::new(2500, 0));
        assert!(account.begin());
        account.submit();
        assert_eq!(account.phase(), RedemptionPhase::Submitting);

        account.confirm(Balance::new(1500, 1));
        assert_eq!(account.balance(), Balance::new(1500, 1));
        assert_eq!(account.phase(), RedemptionPhase::Confirmed);
    }

    #[test]
    fn rejected_attempt_keeps_balance() {
        let mut account = Account::new(Balance::new(2500, 0));
        assert!(account.begin());
        account.submit();
        account.reject();
        assert_eq!(account.balance(), Balance::new(2500, 0));
        assert_eq!(account.phase(), RedemptionPhase::Rejected);
    }

    #[test]
    fn only_one_attempt_at_a_time() {
        let mut account = Account::new(Balance::new(2500, 0));
        assert!(account.begin());
        assert!(!account.begin());
        account.submit();
        assert!(!account.begin());
        account.reject();
        assert!(account.begin());
    }

    #[test]
    fn abandoned_validation_returns_to_idle() {
        let mut account = Account::new(Balance::new(10, 0));
        assert!(account.begin());
        account.abandon();
        assert_eq!(account.phase(), RedemptionPhase::Idle);
    }
}
