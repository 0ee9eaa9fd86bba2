pub mod database;
pub mod descriptions;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod schema_context;

#[cfg(any(test, feature = "fixture"))]
pub mod fixture;

pub use database::Database;
pub use descriptions::Descriptions;
pub use error::StoreError;
pub use executor::SqliteQueryTool;
pub use introspect::{ColumnInfo, TableInfo};
pub use schema_context::SchemaContextProvider;
