//! Credit to coin conversion.

use tracing::{debug, warn};

use super::RedemptionError;
use crate::amount::{ConversionRate, Credits};
use crate::authority::CreditsAuthority;
use crate::model::{Balance, RedemptionInput, RedemptionResult, RedemptionSubmission, UserId};

/// Validate a redemption of `requested` credits and compute its outcome.
///
/// Checks run in order and the first failure wins:
/// - `requested` must be positive
/// - `requested` must be at least one coin worth of credits
/// - `requested` must not exceed `current`
///
/// Only whole coins are granted; the remainder of `requested` is not deducted.
pub fn compute_redemption(
    current: Credits,
    requested: Credits,
    rate: ConversionRate,
) -> Result<RedemptionResult, RedemptionError> {
    if requested.is_zero() {
        return Err(RedemptionError::InvalidAmount(requested.to_string()));
    }

    let minimum = rate.credits_per_coin();
    if requested < minimum {
        return Err(RedemptionError::BelowMinimum { requested, minimum });
    }

    if requested > current {
        return Err(RedemptionError::InsufficientBalance {
            available: current,
            requested,
        });
    }

    let coins_granted = rate.coins_for(requested);
    let credits_deducted = rate.floor(requested);
    debug_assert!(credits_deducted <= current);
    let remaining_credits = Credits::new(current.get() - credits_deducted.get());

    Ok(RedemptionResult {
        coins_granted,
        credits_deducted,
        remaining_credits,
    })
}

/// Parse free-text `input` and run the checks that need no balance.
///
/// An explicit amount must be positive and at least one coin worth of
/// credits; `max` is resolved later against the balance.
pub fn check_request(input: &str, rate: ConversionRate) -> Result<RedemptionInput, RedemptionError> {
    let request = input.parse::<RedemptionInput>()?;
    if let RedemptionInput::Amount(requested) = request {
        let minimum = rate.credits_per_coin();
        if requested < minimum {
            return Err(RedemptionError::BelowMinimum { requested, minimum });
        }
    }
    Ok(request)
}

/// Largest amount `<= current` that converts without remainder.
///
/// Zero means nothing is redeemable.
pub fn max_redeemable(current: Credits, rate: ConversionRate) -> Credits {
    rate.floor(current)
}

/// Submit a computed redemption and return the balance confirmed by the authority.
///
/// Nothing local is touched here; the caller adopts the returned balance only on success.
pub async fn apply_redemption<A: CreditsAuthority + ?Sized>(
    authority: &A,
    user: &UserId,
    result: &RedemptionResult,
) -> Result<Balance, RedemptionError> {
    let submission = RedemptionSubmission::new(user.clone(), result);
    match authority.submit_redemption(&submission).await {
        Ok(confirmed) => {
            debug!(
                user = %user,
                credits = %confirmed.credits,
                coins = %confirmed.coins,
                "authority confirmed redemption"
            );
            Ok(confirmed)
        }
        Err(e) => {
            warn!(user = %user, reason = %e, "authority rejected redemption");
            Err(RedemptionError::Rejected(e))
        }
    }
}
