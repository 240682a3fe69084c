//! Mathematical types for cw-sdk
//!
//! Arbitrary precision token amounts, denom-ordered coin sets and the
//! decimal type used for gas prices.

pub mod coin;
pub mod decimal;
pub mod uint;

pub use coin::{is_valid_denom, Coin, CoinError, Coins};
pub use decimal::Dec;
pub use uint::{ParseUintError, Uint};
