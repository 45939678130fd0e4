//! Ports to the services a saga orchestrates, plus adapters that call the
//! in-process domain services.

pub mod inventory;
pub mod order;

pub use inventory::{InventoryClient, LocalInventoryClient, ProductInfo};
pub use order::{LocalOrderClient, OrderClient};
