use std::{
    fs::{self, File, OpenOptions, ReadDir},
    io::Write as _,
    path::{Path, PathBuf},
    time::SystemTime,
};

pub mod error {
    use std::{io, path::PathBuf};

    pub type Result<T> = std::result::Result<T, self::Error>;

    type Msg = &'static str;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("{0} ({1})")]
        SingleIO(Msg, PathBuf, #[source] io::Error),

        #[error("File already exists: {0}")]
        AlreadyExists(PathBuf),

        #[error("No file in '{0}' matched the program file pattern")]
        NoMatchingFile(PathBuf),
    }
}
pub use error::{Error, Result};

#[must_use]
pub fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn open(filepath: impl AsRef<Path>) -> Result<File> {
    File::open(&filepath)
        .map_err(|e| Error::SingleIO("Cannot open file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn read_dir(dir: impl AsRef<Path>) -> Result<ReadDir> {
    fs::read_dir(&dir).map_err(|e| Error::SingleIO("Cannot read dir", dir.as_ref().to_owned(), e))
}

/// Writes `contents` to a file that must not exist yet.
#[must_use]
pub fn write_new<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    let filepath = filepath.as_ref();
    let mut f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(filepath)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => Error::AlreadyExists(filepath.to_owned()),
            _ => Error::SingleIO("Cannot create file", filepath.to_owned(), e),
        })?;
    f.write_all(contents.as_ref())
        .map_err(|e| Error::SingleIO("Cannot write file", filepath.to_owned(), e))
}

/// Returns the newest regular file in `dir` whose file name satisfies `pred`.
pub fn find_most_recently_modified_file(
    dir: impl AsRef<Path>,
    pred: impl Fn(&str) -> bool,
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in self::read_dir(dir)?.filter_map(std::result::Result::ok) {
        let Ok(meta) = entry.metadata() else {
            continue
        };
        if !meta.is_file() || !pred(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().map_or(true, |(t, _)| mtime > *t) {
            newest = Some((mtime, entry.path()));
        }
    }

    newest
        .map(|(_, path)| path)
        .ok_or_else(|| Error::NoMatchingFile(dir.to_owned()))
}
