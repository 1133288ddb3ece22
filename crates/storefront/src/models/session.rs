//! Session-related types.
//!
//! Login happens in another service; it stores [`CurrentUser`] under
//! [`keys::CURRENT_USER`]. Checkout keeps its own state next to it.

use serde::{Deserialize, Serialize};

use bazaar_core::{Email, UserId};

/// Session-stored user identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the in-progress `CheckoutFlow`.
    pub const CHECKOUT_FLOW: &str = "checkout_flow";
}
