use std::{
    io::{self, Read},
    path::Path,
};

use anyhow::Context as _;

use crate::fsutil;

pub const PREVIEW_MAX_BYTES: usize = 80;
const ELLIPSIS: &[u8] = b"...";

/// Heads of the three files shown side by side on a wrong answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffPreview {
    pub input: String,
    pub expected: String,
    pub output: String,
}

impl DiffPreview {
    pub fn build(
        input_path: impl AsRef<Path>,
        expected_path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            input: preview_file(input_path)?,
            expected: preview_file(expected_path)?,
            output: preview_file(output_path)?,
        })
    }
}

pub fn preview_file(path: impl AsRef<Path>) -> anyhow::Result<String> {
    let path = path.as_ref();
    let f = fsutil::open(path)?;
    preview(f).with_context(|| format!("Failed to read preview of {:?}", path))
}

/// Reads the first [`PREVIEW_MAX_BYTES`] bytes of `reader`.
///
/// A full buffer ends in `...`. Truncation is byte-exact; bytes that do not form
/// valid UTF-8 (a character cut at the boundary included) become one `?` each, so
/// the result never exceeds [`PREVIEW_MAX_BYTES`] bytes.
pub fn preview(reader: impl Read) -> io::Result<String> {
    let mut buf = Vec::with_capacity(PREVIEW_MAX_BYTES);
    reader.take(PREVIEW_MAX_BYTES as u64).read_to_end(&mut buf)?;

    if buf.len() == PREVIEW_MAX_BYTES {
        buf.truncate(PREVIEW_MAX_BYTES - ELLIPSIS.len());
        buf.extend_from_slice(ELLIPSIS);
    }
    Ok(lossy_bytewise(trim_nul(&buf)))
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| b != 0).map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn lossy_bytewise(mut bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                s.push_str(valid);
                return s;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                s.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let invalid_len = e.error_len().unwrap_or(rest.len());
                s.extend(std::iter::repeat('?').take(invalid_len));
                bytes = &rest[invalid_len..];
            }
        }
    }
}
