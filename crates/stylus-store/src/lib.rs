//! Storage layer: the document corpus plus durable JSON persistence of reports,
//! batch summaries, the run log, and the style guide.

mod error;
pub use error::StoreError;

mod fs;
pub use fs::{DocumentStore, FsStore, Layout};

pub use stylus_core::model::report_is_valid;
