//! Low-level helpers shared by the document readers and the workbook writer.
pub mod logging;
pub(crate) mod reader;
pub mod xml;
pub(crate) mod zip;
