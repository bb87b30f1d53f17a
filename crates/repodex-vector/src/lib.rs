#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! repodex-vector
//!
//! Vector index adapter over LanceDB: chunking, embedding via the provider
//! boundary, full-replacement upserts and nearest-neighbor queries.

pub mod adapter;
pub mod chunker;
pub mod schema;
pub mod table;

pub use adapter::LanceVectorIndex;
pub use chunker::chunk_text;
