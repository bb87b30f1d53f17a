#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! repodex-hybrid
//!
//! The two halves of the system meet here: the indexing pipeline keeps
//! both backends consistent with the file tree, and the search engine
//! queries them concurrently and fuses the results.

pub mod engine;
pub mod fusion;
pub mod pipeline;

pub use engine::HybridSearchEngine;
pub use pipeline::{IndexReport, IndexingPipeline};
