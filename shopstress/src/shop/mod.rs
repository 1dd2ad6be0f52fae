//! Driver for the coin-shop HTTP API.
//!
//! [`ShopClient`] wraps each endpoint in a transaction; [`shop_scenario`] is the iteration every
//! virtual user repeats: register two users, transfer coins between them, read the receiver's
//! account and buy every catalog item.
mod client;
mod driver;
mod error;
mod models;

pub use client::{ShopClient, Token};
pub use driver::{random_username, random_username_pair, shop_scenario, ShopContext};
pub use driver::{ITEMS, TRANSFERS_PER_ITERATION, TRANSFER_AMOUNT};
pub use error::ShopError;
pub use models::*;

/// Base URL of the service when none is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Password shared by every generated user
pub const DEFAULT_PASSWORD: &str = "password";
