pub mod admin;
pub mod control;
pub mod ddl;
pub mod filter;
pub mod pool;
pub mod records;

pub use admin::{connect_named_database, create_database, database_exists, delete_database};
pub use control::ControlCatalog;
pub use ddl::{drop_collection_tables, execute_ddl};
pub use filter::push_where;
pub use pool::{connect_pool, quote_ident};
pub use records::{delete_record, get_record, get_records_by_ids, insert_record, list_records, update_record, RecordRow};
