//! Database models

mod profile_document;

pub use profile_document::ProfileDocumentModel;
