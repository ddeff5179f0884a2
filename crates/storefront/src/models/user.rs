//! User domain types.

use serde::{Deserialize, Serialize};

use hardware_storefront_core::{Email, UserId};

/// Snapshot of the signed-in customer, as returned by the profile endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Default shipping address.
    #[serde(default)]
    pub address: Option<String>,
}

/// Editable profile fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl ProfileUpdate {
    /// Whether the update would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.address.is_none()
    }
}
