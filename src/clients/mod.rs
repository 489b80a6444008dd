pub mod extract_client;
pub mod status_client;

pub use extract_client::{FieldRequester, HttpFieldRequester};
pub use status_client::{JobStatus, JobStatusPoller, StatusSnapshot};
