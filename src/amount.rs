use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

/// Whole number of credits, the primary in-app currency.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Credits(u64);

/// Whole number of coins, obtainable only by redeeming credits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Coins(u64);

impl Credits {
    pub const ZERO: Credits = Credits(0);

    pub const fn new(value: u64) -> Self {
        Credits(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_sub(self, rhs: Credits) -> Option<Credits> {
        self.0.checked_sub(rhs.0).map(Credits)
    }
}

impl Coins {
    pub const ZERO: Coins = Coins(0);

    pub const fn new(value: u64) -> Self {
        Coins(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub fn checked_add(self, rhs: Coins) -> Option<Coins> {
        self.0.checked_add(rhs.0).map(Coins)
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Credits {
    fn from(value: u64) -> Self {
        Credits(value)
    }
}

impl From<u64> for Coins {
    fn from(value: u64) -> Self {
        Coins(value)
    }
}

/// Number of credits that buy exactly one coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionRate(NonZeroU64);

impl ConversionRate {
    /// 1000 credits = 1 SkillCoin.
    pub const SKILLCOIN: ConversionRate = match NonZeroU64::new(1000) {
        Some(rate) => ConversionRate(rate),
        None => panic!("conversion rate must be positive"),
    };

    pub const fn new(credits_per_coin: u64) -> Option<Self> {
        match NonZeroU64::new(credits_per_coin) {
            Some(rate) => Some(ConversionRate(rate)),
            None => None,
        }
    }

    /// The rate expressed as credits; also the minimum redeemable amount.
    pub const fn credits_per_coin(self) -> Credits {
        Credits(self.0.get())
    }

    /// Whole coins obtainable for `credits`, rounding down.
    pub const fn coins_for(self, credits: Credits) -> Coins {
        Coins(credits.0 / self.0.get())
    }

    /// Credits spent to obtain `coins`, or `None` on overflow.
    pub fn credits_for(self, coins: Coins) -> Option<Credits> {
        coins.0.checked_mul(self.0.get()).map(Credits)
    }

    /// Largest multiple of the rate that is `<= credits`.
    pub const fn floor(self, credits: Credits) -> Credits {
        Credits(credits.0 - credits.0 % self.0.get())
    }
}

impl fmt::Display for ConversionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} credits per coin", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skillcoin_rate_is_one_thousand() {
        assert_eq!(ConversionRate::SKILLCOIN.credits_per_coin(), Credits::new(1000));
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(ConversionRate::new(0).is_none());
        assert!(ConversionRate::new(1).is_some());
    }

    #[test]
    fn coins_for_rounds_down() {
        let rate = ConversionRate::SKILLCOIN;
        assert_eq!(rate.coins_for(Credits::new(999)), Coins::ZERO);
        assert_eq!(rate.coins_for(Credits::new(1000)), Coins::new(1));
        assert_eq!(rate.coins_for(Credits::new(3500)), Coins::new(3));
    }

    #[test]
    fn credits_for_detects_overflow() {
        let rate = ConversionRate::SKILLCOIN;
        assert_eq!(rate.credits_for(Coins::new(3)), Some(Credits::new(3000)));
        assert_eq!(rate.credits_for(Coins::new(u64::MAX)), None);
    }

    #[test]
    fn floor_drops_remainder() {
        let rate = ConversionRate::SKILLCOIN;
        assert_eq!(rate.floor(Credits::new(3500)), Credits::new(3000));
        assert_eq!(rate.floor(Credits::new(2000)), Credits::new(2000));
        assert_eq!(rate.floor(Credits::new(42)), Credits::ZERO);
    }

    #[test]
    fn checked_sub_refuses_to_go_negative() {
        assert_eq!(
            Credits::new(1500).checked_sub(Credits::new(1000)),
            Some(Credits::new(500))
        );
        assert_eq!(Credits::new(1).checked_sub(Credits::new(2)), None);
    }

    #[test]
    fn checked_add_detects_overflow() {
        assert_eq!(Coins::new(2).checked_add(Coins::new(1)), Some(Coins::new(3)));
        assert_eq!(Coins::new(u64::MAX).checked_add(Coins::new(1)), None);
    }

    #[test]
    fn display_is_plain_integer() {
        assert_eq!(Credits::new(2500).to_string(), "2500");
        assert_eq!(Coins::new(3).to_string(), "3");
        assert_eq!(
            ConversionRate::SKILLCOIN.to_string(),
            "1000 credits per coin"
        );
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Credits::default(), Credits::ZERO);
        assert_eq!(Coins::default(), Coins::ZERO);
    }

    #[test]
    fn ordering() {
        assert!(Credits::new(999) < Credits::new(1000));
        assert!(Coins::new(1) > Coins::ZERO);
    }
}
