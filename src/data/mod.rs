pub mod file_store;
pub mod history;
pub mod query;
pub mod store;
