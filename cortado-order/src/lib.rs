pub mod changes;
pub mod engine;
pub mod memory;
pub mod models;
pub mod reservation;
pub mod store;

pub use changes::{collect_changes, ChangeRecord};
pub use engine::FulfillmentEngine;
pub use memory::MemoryStore;
pub use models::{
    BatchSummary, NewOrder, Order, OrderItem, OrderOutcome, OrderStatus, PricedItem, RejectReason,
    UpdateOrder,
};
pub use store::{ChangeHistoryRecorder, FulfillmentStore, FulfillmentTx, OrderStore};
