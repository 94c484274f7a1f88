use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cortado_core::StorageError;

/// One ingredient drawn from inventory per unit of a menu item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientRequirement {
    pub ingredient_id: Uuid,
    pub quantity_per_unit: f64,
}

/// A sellable catalog entry. Read-only input to the fulfillment engine:
/// the price here is snapshotted into order items at processing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Price in cents.
    pub price_cents: i64,
    pub categories: Vec<String>,
    pub allergens: Vec<String>,
    /// Ordered list of inventory requirements per unit sold.
    pub ingredients: Vec<IngredientRequirement>,
    pub created_at: DateTime<Utc>,
}

/// Read capability over the menu catalog.
#[async_trait]
pub trait MenuCatalog: Send + Sync {
    async fn menu_item(&self, id: Uuid) -> Result<Option<MenuItem>, StorageError>;
}
