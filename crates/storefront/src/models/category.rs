//! Product categories.

use serde::{Deserialize, Serialize};

use hardware_storefront_core::CategoryId;

/// A catalog category (e.g., "Power Tools").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub image_url: Option<String>,
}
