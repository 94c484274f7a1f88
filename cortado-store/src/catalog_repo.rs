use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use cortado_catalog::{
    IngredientRequirement, InventoryItem, InventoryReader, MenuCatalog, MenuItem,
};
use cortado_core::StorageError;

pub struct PgMenuCatalog {
    pool: PgPool,
}

impl PgMenuCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MenuItemRow {
    menu_item_id: Uuid,
    name: String,
    description: Option<String>,
    price_cents: i64,
    categories: Vec<String>,
    allergens: Vec<String>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct IngredientRow {
    inventory_id: Uuid,
    quantity: f64,
}

#[async_trait]
impl MenuCatalog for PgMenuCatalog {
    async fn menu_item(&self, id: Uuid) -> Result<Option<MenuItem>, StorageError> {
        let row = sqlx::query_as::<_, MenuItemRow>(
            "SELECT menu_item_id, name, description, price_cents, categories, allergens, created_at \
             FROM menu_items WHERE menu_item_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::database)?;

        let Some(row) = row else { return Ok(None) };

        let ingredients = sqlx::query_as::<_, IngredientRow>(
            "SELECT inventory_id, quantity FROM menu_item_ingredients \
             WHERE menu_item_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::database)?;

        Ok(Some(MenuItem {
            id: row.menu_item_id,
            name: row.name,
            description: row.description,
            price_cents: row.price_cents,
            categories: row.categories,
            allergens: row.allergens,
            ingredients: ingredients
                .into_iter()
                .map(|r| IngredientRequirement {
                    ingredient_id: r.inventory_id,
                    quantity_per_unit: r.quantity,
                })
                .collect(),
            created_at: row.created_at,
        }))
    }
}

pub struct PgInventory {
    pool: PgPool,
}

impl PgInventory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_item(&self, item: &InventoryItem) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO inventory (ingredient_id, name, quantity, unit, price_cents) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.price_cents)
        .execute(&self.pool)
        .await
        .map_err(StorageError::database)?;
        Ok(())
    }

    /// Administrative stock correction. Returns false when the
    /// ingredient does not exist.
    pub async fn update_item(&self, item: &InventoryItem) -> Result<bool, StorageError> {
        let updated = sqlx::query(
            "UPDATE inventory SET name = $2, quantity = $3, unit = $4, price_cents = $5, \
             updated_at = NOW() WHERE ingredient_id = $1",
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.price_cents)
        .execute(&self.pool)
        .await
        .map_err(StorageError::database)?;
        Ok(updated.rows_affected() > 0)
    }

    pub async fn delete_item(&self, id: Uuid) -> Result<bool, StorageError> {
        let deleted = sqlx::query("DELETE FROM inventory WHERE ingredient_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::database)?;
        Ok(deleted.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct InventoryRow {
    ingredient_id: Uuid,
    name: String,
    quantity: f64,
    unit: String,
    price_cents: i64,
}

impl InventoryRow {
    fn into_item(self) -> InventoryItem {
        InventoryItem {
            id: self.ingredient_id,
            name: self.name,
            quantity: self.quantity,
            unit: self.unit,
            price_cents: self.price_cents,
        }
    }
}

#[async_trait]
impl InventoryReader for PgInventory {
    async fn inventory_item(&self, id: Uuid) -> Result<Option<InventoryItem>, StorageError> {
        let row = sqlx::query_as::<_, InventoryRow>(
            "SELECT ingredient_id, name, quantity, unit, price_cents \
             FROM inventory WHERE ingredient_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::database)?;
        Ok(row.map(InventoryRow::into_item))
    }

    async fn list_inventory(&self) -> Result<Vec<InventoryItem>, StorageError> {
        let rows = sqlx::query_as::<_, InventoryRow>(
            "SELECT ingredient_id, name, quantity, unit, price_cents FROM inventory ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::database)?;
        Ok(rows.into_iter().map(InventoryRow::into_item).collect())
    }
}
