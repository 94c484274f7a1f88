pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod history_repo;
pub mod order_repo;

pub use app_config::Config;
pub use catalog_repo::{PgInventory, PgMenuCatalog};
pub use database::DbClient;
pub use history_repo::PgChangeHistory;
pub use order_repo::PgOrderStore;
