use std::collections::BTreeMap;

use tracing::warn;

use cortado_catalog::{InventoryReservation, MenuCatalog};
use cortado_core::{EngineError, EngineResult};

use crate::models::{OrderItem, PricedItem};
use crate::store::FulfillmentTx;

/// Everything one order claims from the shop: its total at current
/// menu prices, the priced items to persist, and the per-ingredient
/// stock it consumed.
#[derive(Debug)]
pub struct ReservationOutcome {
    pub total_cents: i64,
    pub priced_items: Vec<PricedItem>,
    pub reservations: Vec<InventoryReservation>,
}

/// Check-and-reserve for one order inside an open transaction.
///
/// Resolves each item's ingredient requirements from the catalog,
/// aggregates demand per ingredient across the whole order, then
/// verifies every ingredient before deducting any. Either all
/// deductions happen or none do; committing is the caller's job.
pub async fn check_and_reserve(
    tx: &mut dyn FulfillmentTx,
    catalog: &dyn MenuCatalog,
    items: &[OrderItem],
) -> EngineResult<ReservationOutcome> {
    let mut demand: BTreeMap<uuid::Uuid, f64> = BTreeMap::new();
    let mut total_cents: i64 = 0;
    let mut priced_items = Vec::with_capacity(items.len());

    for item in items {
        if item.menu_item_id.is_nil() {
            return Err(EngineError::Reference("order item has no menu item id".into()));
        }
        let menu_item = catalog
            .menu_item(item.menu_item_id)
            .await?
            .ok_or_else(|| {
                EngineError::Reference(format!("menu item not found: {}", item.menu_item_id))
            })?;
        if menu_item.ingredients.is_empty() {
            return Err(EngineError::Reference(format!(
                "no inventory mapping for menu item: {}",
                menu_item.name
            )));
        }

        for req in &menu_item.ingredients {
            *demand.entry(req.ingredient_id).or_insert(0.0) +=
                req.quantity_per_unit * f64::from(item.quantity);
        }

        total_cents += menu_item.price_cents * i64::from(item.quantity);
        priced_items.push(PricedItem {
            menu_item_id: item.menu_item_id,
            quantity: item.quantity,
            price_at_order_cents: menu_item.price_cents,
        });
    }

    // Verify every ingredient before deducting any, so a shortage
    // leaves no partial deduction behind.
    let mut sufficient = Vec::with_capacity(demand.len());
    for (&ingredient_id, &required) in &demand {
        let stock = tx
            .inventory_item(ingredient_id)
            .await?
            .ok_or_else(|| EngineError::Reference(format!("ingredient not found: {ingredient_id}")))?;
        if stock.quantity < required {
            warn!(
                ingredient = %stock.name,
                available = stock.quantity,
                required,
                "insufficient inventory"
            );
            return Err(EngineError::InsufficientStock(stock.name));
        }
        sufficient.push((stock, required));
    }

    let mut reservations = Vec::with_capacity(sufficient.len());
    for (stock, required) in sufficient {
        let remaining = tx.deduct_stock(stock.id, required).await?;
        reservations.push(InventoryReservation {
            ingredient_id: stock.id,
            name: stock.name,
            quantity_used: required,
            remaining,
        });
    }

    Ok(ReservationOutcome {
        total_cents,
        priced_items,
        reservations,
    })
}
