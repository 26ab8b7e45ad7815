//! Sheet-backed entity stores

mod customers;
mod entity;
mod memory;
mod messages;
mod receptions;
mod tabular;
mod tasks;
mod users;

pub use customers::CustomerStore;
pub use entity::{EntityStore, LoadSource, Outcome, StoreState};
pub use memory::MemoryTables;
pub use messages::MessageStore;
pub use receptions::ReceptionStore;
pub use tabular::{order_values, Row, SheetsTable, Table, TabularStore};
pub use tasks::{FailedUpload, ImageUploadReport, TaskStore};
pub use users::UserStore;
