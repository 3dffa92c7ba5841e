//! Plain-text report.
//!
//! ```text
//! 0 probable duplicate files
//! 0 path: /root/a.txt | size=5
//! 1 path: /root/b.txt | size=5
//! --------
//! overall 1 groups 2 files probably duplicate
//! ```

use std::io::{self, Write};

use crate::duplicates::DuplicateGroup;

/// Line separating groups.
pub const GROUP_SEPARATOR: &str = "--------";

/// Text report over a slice of groups.
#[derive(Debug, Clone, Copy)]
pub struct TextOutput<'a> {
    groups: &'a [DuplicateGroup],
}

impl<'a> TextOutput<'a> {
    /// Create a report for `groups`.
    #[must_use]
    pub fn new(groups: &'a [DuplicateGroup]) -> Self {
        Self { groups }
    }

    /// Number of files listed across all groups.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.groups.iter().map(DuplicateGroup::len).sum()
    }

    /// Write the report.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for (group_idx, group) in self.groups.iter().enumerate() {
            writeln!(writer, "{group_idx} probable duplicate files")?;
            for (idx, file) in group.files.iter().enumerate() {
                writeln!(
                    writer,
                    "{idx} path: {} | size={}",
                    file.path.display(),
                    file.size
                )?;
            }
            writeln!(writer, "{GROUP_SEPARATOR}")?;
        }

        writeln!(
            writer,
            "overall {} groups {} files probably duplicate",
            self.groups.len(),
            self.file_count()
        )
    }

    /// Render the report to a string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}
