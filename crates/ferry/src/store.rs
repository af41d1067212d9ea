//! Persistence seam for imported containers and items.
//!
//! The pipeline never owns storage. Callers inject an [`ImportStore`]; the
//! crate ships [`MemoryStore`] for tests and dry runs.

mod errors;
mod memory;
mod types;

pub use errors::{Result, StoreError};
pub use memory::MemoryStore;
pub use types::{ContainerRecord, ImportStore, ItemRecord, StoredContainer, StoredItem};
