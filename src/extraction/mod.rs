//! # Field Extraction
//!
//! Resolves the configured field labels against a document's tables and
//! collects one [`ExtractionRecord`] per document into a [`Dataset`].
pub mod fields;
pub mod record;
pub mod resolver;

pub use fields::{default_fields, FIELDS, SOURCE_FILE_COLUMN};
pub use record::{Dataset, ExtractionRecord};
pub use resolver::{
    get_field_value, locate, resolve, FieldResolver, LabelMatcher, LabelMatching, Resolution, ValueSource,
    NOT_FOUND,
};
