// handlers/data/mod.rs - record handlers, one file per route operation

pub mod record_get; // GET /api/data/:schema/:id
pub mod record_put; // PUT /api/data/:schema/:id
pub mod schema_get; // GET /api/data/:schema
pub mod schema_post; // POST /api/data/:schema

pub use record_get::record_get;
pub use record_put::record_put;
pub use schema_get::schema_get;
pub use schema_post::schema_post;
