//! News article collection with deduplicated storage, cursor search, and
//! daily snapshot backup/restore.

pub mod api;
pub mod backup;
pub mod collect;
pub mod config;
pub mod feed;
pub mod ingest;
pub mod restore;
pub mod search;
pub mod storage;
pub mod util;
