//! Call domain entities.

pub mod model;
pub mod record;
pub mod summary;

pub use model::{Call, NewCall};
pub use record::CallRecord;
pub use summary::{format_duration, format_status, summarize};
