pub mod filter;
pub mod group;
pub mod mutate;
pub mod schema;
pub mod settings;
pub mod store;

pub use store::Store;
