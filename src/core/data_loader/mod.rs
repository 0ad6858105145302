mod cache;
mod data_loader;
mod loader;

pub use cache::{CacheFactory, CacheStorage, HashMapCache, LruCache, NoCache};
pub use data_loader::DataLoader;
pub use loader::{BatchResults, LoadError, Loader};
