pub mod inventory;
pub mod menu;

pub use inventory::{
    leftovers, InventoryItem, InventoryReader, InventoryReservation, LeftoverPage, LeftoverSort,
};
pub use menu::{IngredientRequirement, MenuCatalog, MenuItem};
