#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! repodex-scan
//!
//! File enumeration, content fingerprinting, change classification and the
//! persisted fingerprint store backing incremental indexing.

pub mod changes;
pub mod scanner;
pub mod store;

pub use changes::{detect, ChangeSet};
pub use scanner::RepoScanner;
pub use store::JsonFingerprintStore;
