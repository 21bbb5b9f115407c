//! weave-logstore - replication metadata for threads and their logs
//!
//! Four books share one datastore, each under its own key namespace:
//!
//! | Book           | Keys                                              |
//! |----------------|---------------------------------------------------|
//! | `KeyBook`      | `/thread/keys/<thread>/<log>:(pub\|priv)`, `/thread/keys/<thread>:(repl\|read)` |
//! | `AddrBook`     | `/thread/addrs/<thread>/<log>/<hex(addr)>`        |
//! | `HeadBook`     | `/thread/heads/<thread>/<log>`                    |
//! | `MetadataBook` | `/thread/meta/<thread>/<key>`                     |
//!
//! `LogStore` composes them into thread/log level operations.

mod addr_book;
mod error;
mod head_book;
mod info;
mod key_book;
mod keys;
mod logstore;
mod metadata_book;
pub mod proto;

pub use addr_book::{AddrBook, NewAddr, PERMANENT_ADDR_TTL};
pub use error::LogStoreError;
pub use head_book::HeadBook;
pub use info::{LogInfo, ThreadInfo};
pub use key_book::KeyBook;
pub use logstore::LogStore;
pub use metadata_book::MetadataBook;
