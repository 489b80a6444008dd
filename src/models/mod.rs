pub mod field_key;
pub mod report;

pub use field_key::FieldKey;
pub use report::{ExtractedReport, ReportIdentity, ReportItem, Summary};
