use std::path::Path;

use crate::record::{DesignRecord, RecordTable};
use crate::Result;

/// A backing store of design records.
///
/// `load` is a pure read returning rows in the store's natural order;
/// that order becomes the row index space of the fitted matrix.
pub trait RecordSource: Send + Sync {
    fn load(&self) -> Result<RecordTable>;

    /// Persist one new record at the end of the store.
    fn append(&self, record: &DesignRecord) -> Result<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// Local file backing this source, when there is one.
    fn file_path(&self) -> Option<&Path> {
        None
    }

    /// Raw contents of the backing file, read without racing `append`.
    /// `None` for sources that are not file-backed.
    fn read_file(&self) -> Option<Result<Vec<u8>>> {
        None
    }
}
