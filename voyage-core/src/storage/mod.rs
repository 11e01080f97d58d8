pub mod assets;
mod in_memory;
mod traits;

pub use assets::{AssetStore, FsAssetStore};
pub use in_memory::InMemoryCatalog;
pub use traits::{Catalog, CatalogTransaction};
