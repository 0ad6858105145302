pub mod data_loader;
pub mod entity;
pub mod error;
pub mod loader;
pub mod request_context;
pub mod resolver;
pub mod store;
