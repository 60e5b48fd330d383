pub mod flat_index;
pub mod store;

pub use flat_index::VectorIndex;
pub use store::IndexStore;
