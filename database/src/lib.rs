mod access;
mod db;
mod errors;
mod key;
mod registry;
mod staging;

pub use errors::{StoreError, StoreResult, StoreResultExtensions};

pub mod prelude {
    pub use super::access::HeightedDbAccess;
    pub use super::db::{delete_db, ConnBuilder, KvEngine, MemEngine, RocksEngine, ScanDirection, ScanRange, WriteOp};
    pub use super::errors::{StoreError, StoreResult, StoreResultExtensions};
    pub use super::key::{bucket_path, prefix_successor, split_height_suffix, successor, DbKey, HEIGHT_SUFFIX_LEN};
    pub use super::registry::{DatabaseStorePrefixes, SEPARATOR};
    pub use super::staging::StagedDb;
}
