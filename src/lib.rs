pub mod amount;
pub mod authority;
pub mod config;
pub mod csv;
pub mod ledger;
pub mod model;

pub use amount::{Coins, ConversionRate, Credits};
pub use authority::{CreditsAuthority, HttpAuthority, InMemoryAuthority};
pub use config::Config;
pub use ledger::{
    AuthorityError, Ledger, LedgerError, RedemptionError, RedemptionPhase, apply_redemption,
    check_request, compute_redemption, max_redeemable,
};
pub use model::{
    Balance, Redemption, RedemptionCommand, RedemptionInput, RedemptionResult, UserId,
    parse_amount,
};
