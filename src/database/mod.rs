pub mod postgres;
pub mod record;
pub mod schema;
pub mod store;

pub use postgres::PgStore;
pub use record::{Record, RecordError, RowData, SYSTEM_FIELDS};
pub use schema::{SchemaRegistry, SensitiveSchema};
pub use store::{row_id, MemoryStore, RecordStore, StoreError};
