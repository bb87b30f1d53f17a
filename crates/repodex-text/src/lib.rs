#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! repodex-text
//!
//! Keyword index adapter over tantivy. One whole-document record per
//! `DocId`; upsert replaces, delete removes, query returns BM25-scored
//! hits with highlighted snippets.

pub mod adapter;
pub mod tantivy_utils;

pub use adapter::TantivyKeywordIndex;
