//! Append-only text sink for controller status messages.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One plain-text file, one line per message, in arrival order.
///
/// The file is created on the first append. Every append is flushed before
/// it returns, so a crash never leaves half a line behind.
#[derive(Debug)]
pub struct StatusLog {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    lines: u64,
    closed: bool,
}

impl StatusLog {
    /// Prepares a log at `path` without touching the filesystem.
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            lines: 0,
            closed: false,
        }
    }

    /// Appends `line` as one complete line. Embedded line breaks are flattened.
    pub fn append(&mut self, line: &str) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("status log {} is closed", self.path.display()),
            ));
        }

        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => BufWriter::new(File::create(&self.path)?),
        };
        let writer = self.writer.insert(writer);
        let flat = line.replace(['\r', '\n'], " ");
        writeln!(writer, "{flat}")?;
        writer.flush()?;

        self.lines += 1;
        Ok(())
    }

    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and syncs the file. Further appends fail.
    pub fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }
}

impl Drop for StatusLog {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}
