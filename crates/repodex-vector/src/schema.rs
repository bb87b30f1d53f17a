use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Arrow schema of the chunk table. The embedding dimension comes from the
/// configured provider, so the schema is built per connection rather than
/// being a constant.
pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("doc_id", DataType::Utf8, false),
        Field::new("repo", DataType::Utf8, false),
        Field::new("rel_path", DataType::Utf8, false),
        Field::new("file_type", DataType::Utf8, false),
        Field::new("seq", DataType::Int32, false),
        Field::new("content", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
            true,
        ),
    ]))
}
