mod models;
mod schema;
mod source;
mod store;
mod trait_def;

pub use models::SongRecord;
pub use schema::CATALOG_VERSIONED_SCHEMAS;
pub use source::{parse_songs_source, reload_catalog};
pub use store::SqliteCatalogStore;
pub use trait_def::CatalogStore;
