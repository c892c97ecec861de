//! Flat-file line store.
//!
//! One file per table under a root directory. Edits of existing lines go
//! through a private `rewrite` step, which streams the table into a temporary
//! sibling and renames it over the original only once it is complete and
//! synced.

use std::{
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use tempfile::Builder;

use crate::{
    LineStore, StoreError,
    table::{validate_line, validate_range, validate_table},
};

/// Step at which an injected crash aborts a rewrite.
///
/// Used by tests to prove that an interrupted edit never changes the visible
/// table. The temporary file is left behind, as a real crash would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPoint {
    /// After the first line has been copied into the temporary file.
    MidCopy,
    /// After the temporary file is complete and synced, before the rename.
    BeforeRename,
}

/// What a rewrite does with one source line.
enum LineEdit<'a> {
    Keep,
    Remove,
    Replace(&'a str),
}

/// Line store backed by flat files in one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: Arc<PathBuf>,
    crash: Arc<Mutex<Option<CrashPoint>>>,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "opened file store");
        Ok(Self { root: Arc::new(root), crash: Arc::new(Mutex::new(None)) })
    }

    /// Directory holding the table files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Abort the next rewrite at `point`. One-shot.
    pub fn inject_crash(&self, point: CrashPoint) {
        *self.crash.lock().unwrap_or_else(PoisonError::into_inner) = Some(point);
    }

    fn path(&self, table: &str) -> Result<PathBuf, StoreError> {
        validate_table(table)?;
        Ok(self.root.join(table))
    }

    fn open_existing(&self, table: &str) -> Result<File, StoreError> {
        let path = self.path(table)?;
        File::open(&path).map_err(|err| missing_or_io(table, err))
    }

    fn crash_at(&self, point: CrashPoint) -> bool {
        let mut crash = self.crash.lock().unwrap_or_else(PoisonError::into_inner);
        if *crash == Some(point) {
            *crash = None;
            return true;
        }
        false
    }

    /// Stream `table` through `edit` into a temp file and rename it over the
    /// original. Returns the number of lines removed or replaced; when that
    /// is zero the original is left as is and the temp file discarded.
    fn rewrite<'a, F>(&self, table: &str, mut edit: F) -> Result<usize, StoreError>
    where
        F: FnMut(usize) -> LineEdit<'a>,
    {
        let path = self.path(table)?;
        let source = File::open(&path).map_err(|err| missing_or_io(table, err))?;
        let mut reader = BufReader::new(source);

        let mut temp = Builder::new()
            .prefix(&format!(".{table}."))
            .suffix(".tmp")
            .tempfile_in(self.root.as_path())?;

        let mut touched = 0;
        let mut line = String::new();
        let mut n = 0;
        {
            let mut writer = io::BufWriter::new(temp.as_file_mut());
            loop {
                line.clear();
                if reader.read_line(&mut line)? == 0 {
                    break;
                }
                n += 1;
                match edit(n) {
                    LineEdit::Keep => writer.write_all(line.as_bytes())?,
                    LineEdit::Remove => touched += 1,
                    LineEdit::Replace(new) => {
                        writer.write_all(new.as_bytes())?;
                        writer.write_all(b"\n")?;
                        touched += 1;
                    },
                }
                if n == 1 && self.crash_at(CrashPoint::MidCopy) {
                    writer.flush()?;
                    drop(writer);
                    return Err(abandon(temp, CrashPoint::MidCopy));
                }
            }
            writer.flush()?;
        }

        if touched == 0 {
            return Ok(0);
        }

        temp.as_file().sync_all()?;
        if self.crash_at(CrashPoint::BeforeRename) {
            return Err(abandon(temp, CrashPoint::BeforeRename));
        }

        temp.persist(&path).map_err(|err| StoreError::Io(err.error.to_string()))?;
        tracing::trace!(table, touched, "table rewritten");
        Ok(touched)
    }
}

/// Keep the temp file on disk and report the injected crash.
fn abandon(temp: tempfile::NamedTempFile, point: CrashPoint) -> StoreError {
    match temp.into_temp_path().keep() {
        Ok(path) => tracing::warn!(temp = %path.display(), ?point, "injected crash"),
        Err(err) => tracing::warn!(%err, ?point, "injected crash, temp file lost"),
    }
    StoreError::Io(format!("injected crash at {point:?}"))
}

/// Whether the file is empty or its last byte is a line terminator.
fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn missing_or_io(table: &str, err: io::Error) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::MissingTable(table.to_string())
    } else {
        StoreError::from(err)
    }
}

impl LineStore for FileStore {
    fn ensure_exists(&self, table: &str) -> Result<(), StoreError> {
        let path = self.path(table)?;
        OpenOptions::new().create(true).append(true).open(path)?;
        Ok(())
    }

    fn append(&self, table: &str, line: &str) -> Result<(), StoreError> {
        validate_line(line)?;
        let path = self.path(table)?;
        let mut file = OpenOptions::new().create(true).read(true).append(true).open(path)?;
        let mut record = String::with_capacity(line.len() + 2);
        if !ends_with_newline(&mut file)? {
            // Terminate a hand-written final line instead of joining onto it.
            record.push('\n');
        }
        record.push_str(line);
        record.push('\n');
        file.write_all(record.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    fn read(&self, table: &str, n: usize) -> Result<String, StoreError> {
        let mut reader = BufReader::new(self.open_existing(table)?);
        let mut line = String::new();
        if n == 0 {
            return Err(StoreError::NotFound { table: table.to_string(), line: n });
        }
        for _ in 0..n {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(StoreError::NotFound { table: table.to_string(), line: n });
            }
        }
        Ok(line)
    }

    fn read_all(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let reader = BufReader::new(self.open_existing(table)?);
        reader.lines().map(|line| line.map_err(StoreError::from)).collect()
    }

    fn overwrite(&self, table: &str, n: usize, line: &str) -> Result<(), StoreError> {
        validate_line(line)?;
        let replaced =
            self.rewrite(table, |i| if i == n { LineEdit::Replace(line) } else { LineEdit::Keep })?;
        if replaced == 0 {
            return Err(StoreError::NotFound { table: table.to_string(), line: n });
        }
        Ok(())
    }

    fn delete_range(&self, table: &str, start: usize, end: usize) -> Result<usize, StoreError> {
        validate_range(start, end)?;
        self.rewrite(table, |i| {
            if (start..=end).contains(&i) { LineEdit::Remove } else { LineEdit::Keep }
        })
    }

    fn truncate(&self, table: &str) -> Result<(), StoreError> {
        let path = self.path(table)?;
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|err| missing_or_io(table, err))?;
        file.sync_all()?;
        Ok(())
    }

    fn count(&self, table: &str) -> Result<usize, StoreError> {
        let mut reader = BufReader::new(self.open_existing(table)?);
        let mut buf = Vec::new();
        let mut lines = 0;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(lines);
            }
            lines += 1;
        }
    }
}
