use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Reads a pre-generated question file. The contents are returned as-is; a
/// file without questions fails the session, not the load.
pub fn load_question_blob(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read question file: {}", path.display()))
}
