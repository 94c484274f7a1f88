use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cortado_core::{EngineError, StorageError};

/// One stocked ingredient. Quantity is decimal (grams, ml, shots) and
/// never negative after a committed operation; it is mutated only by
/// reservation or an explicit administrative update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    /// Unit cost in cents.
    pub price_cents: i64,
}

/// Per-ingredient result of reserving stock for one order. Aggregated
/// when several items of the order draw on the same ingredient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReservation {
    pub ingredient_id: Uuid,
    pub name: String,
    pub quantity_used: f64,
    pub remaining: f64,
}

/// Read capability over ingredient stock, used by administrative
/// surfaces. Reservation reads go through the fulfillment transaction
/// instead so they observe uncommitted deductions.
#[async_trait]
pub trait InventoryReader: Send + Sync {
    async fn inventory_item(&self, id: Uuid) -> Result<Option<InventoryItem>, StorageError>;

    async fn list_inventory(&self) -> Result<Vec<InventoryItem>, StorageError>;
}

/// Sort order for the leftovers report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeftoverSort {
    Price,
    Quantity,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeftoverPage {
    pub items: Vec<InventoryItem>,
    pub total_pages: usize,
}

/// Leftover stock: items still in stock, optionally sorted, paginated.
pub fn leftovers(
    items: Vec<InventoryItem>,
    sort: Option<LeftoverSort>,
    page: usize,
    page_size: usize,
) -> Result<LeftoverPage, EngineError> {
    if page_size == 0 {
        return Err(EngineError::Validation("page size must be positive".into()));
    }

    let mut left: Vec<InventoryItem> = items.into_iter().filter(|i| i.quantity > 0.0).collect();
    match sort {
        Some(LeftoverSort::Price) => left.sort_by_key(|i| i.price_cents),
        Some(LeftoverSort::Quantity) => {
            left.sort_by(|a, b| a.quantity.total_cmp(&b.quantity));
        }
        None => {}
    }

    let total_pages = left.len().div_ceil(page_size);
    if page < 1 || page > total_pages.max(1) {
        return Err(EngineError::Validation(format!("page {page} out of range")));
    }

    let start = (page - 1) * page_size;
    let end = (start + page_size).min(left.len());
    Ok(LeftoverPage {
        items: left[start..end].to_vec(),
        total_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, quantity: f64, price_cents: i64) -> InventoryItem {
        InventoryItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            quantity,
            unit: "g".to_string(),
            price_cents,
        }
    }

    #[test]
    fn leftovers_drop_empty_stock_and_sort_by_quantity() {
        let items = vec![item("beans", 120.0, 900), item("milk", 0.0, 300), item("syrup", 40.0, 500)];

        let page = leftovers(items, Some(LeftoverSort::Quantity), 1, 10).unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].name, "syrup");
        assert_eq!(page.items[1].name, "beans");
    }

    #[test]
    fn leftovers_paginate_and_reject_out_of_range_page() {
        let items = vec![item("beans", 1.0, 1), item("milk", 2.0, 2), item("syrup", 3.0, 3)];

        let page = leftovers(items.clone(), Some(LeftoverSort::Price), 2, 2).unwrap();
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "syrup");

        let err = leftovers(items, None, 3, 2).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
