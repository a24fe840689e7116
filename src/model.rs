//! Core domain types for the credit ledger.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::amount::{Coins, ConversionRate, Credits};
use crate::ledger::RedemptionError;

/// Identifier assigned to a user by the remote authority.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId(id.to_string())
    }
}

/// A user's balance in both currencies.
///
/// Deserializes from `credits` or the legacy `totalCredits`; when both are
/// present `credits` wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "BalanceWire")]
pub struct Balance {
    pub credits: Credits,
    pub coins: Coins,
}

#[derive(Deserialize)]
struct BalanceWire {
    credits: Option<Credits>,
    #[serde(rename = "totalCredits")]
    total_credits: Option<Credits>,
    #[serde(default)]
    coins: Coins,
}

impl TryFrom<BalanceWire> for Balance {
    type Error = String;

    fn try_from(wire: BalanceWire) -> Result<Self, Self::Error> {
        let credits = wire
            .credits
            .or(wire.total_credits)
            .ok_or("missing field `credits`")?;
        Ok(Balance {
            credits,
            coins: wire.coins,
        })
    }
}

impl Balance {
    pub fn new(credits: impl Into<Credits>, coins: impl Into<Coins>) -> Self {
        Self {
            credits: credits.into(),
            coins: coins.into(),
        }
    }

    /// Whether at least one coin can be obtained at `rate`.
    pub fn can_redeem(&self, rate: ConversionRate) -> bool {
        self.credits >= rate.credits_per_coin()
    }
}

/// Outcome of a validated redemption request.
///
/// Only whole-coin-equivalent credits are deducted; any remainder of the
/// requested amount stays in the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedemptionResult {
    pub coins_granted: Coins,
    pub credits_deducted: Credits,
    pub remaining_credits: Credits,
}

/// Caller input for a redemption, parsed from free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionInput {
    /// Redeem as many whole coins as the balance allows.
    Max,
    /// Redeem an explicit amount of credits.
    Amount(Credits),
}

impl FromStr for RedemptionInput {
    type Err = RedemptionError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.trim().eq_ignore_ascii_case("max") {
            return Ok(RedemptionInput::Max);
        }
        parse_amount(text).map(RedemptionInput::Amount)
    }
}

/// Parse a free-text credit amount.
///
/// Accepts decimal digits with an optional leading `+` and surrounding
/// whitespace. Anything else, including zero, fails with `InvalidAmount`.
pub fn parse_amount(text: &str) -> Result<Credits, RedemptionError> {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RedemptionError::InvalidAmount(text.to_string()));
    }
    match digits.parse::<u64>() {
        Ok(0) | Err(_) => Err(RedemptionError::InvalidAmount(text.to_string())),
        Ok(value) => Ok(Credits::new(value)),
    }
}

/// Body submitted to the authority to apply a redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionSubmission {
    pub user_id: UserId,
    pub credits_deducted: Credits,
    pub coins_granted: Coins,
}

impl RedemptionSubmission {
    pub fn new(user_id: UserId, result: &RedemptionResult) -> Self {
        Self {
            user_id,
            credits_deducted: result.credits_deducted,
            coins_granted: result.coins_granted,
        }
    }
}

/// A redemption request as received from the caller, amount still unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionCommand {
    pub user: UserId,
    pub amount: String,
}

/// A redemption confirmed by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redemption {
    pub result: RedemptionResult,
    /// Balance confirmed by the authority after the redemption.
    pub balance: Balance,
}
