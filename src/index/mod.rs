use crate::{FileDiff, HunkHeader};
use std::collections::HashMap;

/// Per-file hunk lists of one diff, keyed by the file's old path.
///
/// Comments being migrated are always expressed against the pre-change side
/// of the diff, so the old path is the one they match.
#[derive(Debug, Default, Clone)]
pub struct FileHunkIndex {
    by_path: HashMap<String, Vec<HunkHeader>>,
}

impl FileHunkIndex {
    pub fn from_files<I>(files: I) -> Self
    where
        I: IntoIterator<Item = FileDiff>,
    {
        let mut index = Self::default();
        index.extend(files);
        index
    }

    /// Add more files. Hunks for an old path seen before are appended.
    pub fn extend<I>(&mut self, files: I)
    where
        I: IntoIterator<Item = FileDiff>,
    {
        for file in files {
            self.by_path
                .entry(file.old_path)
                .or_default()
                .extend(file.hunks);
        }
    }

    /// Hunks touching `path`, or an empty slice if the diff left it alone.
    pub fn lookup(&self, path: &str) -> &[HunkHeader] {
        self.by_path.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}
