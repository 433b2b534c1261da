mod category;
mod item;
mod key;
mod store;

pub use category::Category;
pub use item::{Partition, WorkCatalog, WorkItem};
pub use key::ContentKey;
pub use store::AssetStore;
