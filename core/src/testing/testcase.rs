use std::{
    cmp::Ordering,
    fs::File,
    path::{Path, PathBuf},
};

use crate::fsutil;

/// A pair of input and expected-output files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    index: u32,
    name: String,
    input_path: PathBuf,
    expected_path: PathBuf,
}

impl TestCase {
    pub const INPUT_EXT: &str = "in";
    pub const EXPECTED_EXT: &str = "out";

    pub fn new(
        index: u32,
        name: impl Into<String>,
        input: impl Into<PathBuf>,
        expected: impl Into<PathBuf>,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            input_path: input.into(),
            expected_path: expected.into(),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn expected_path(&self) -> &Path {
        &self.expected_path
    }

    pub fn open_input(&self) -> fsutil::Result<File> {
        fsutil::open(&self.input_path)
    }

    pub fn open_expected(&self) -> fsutil::Result<File> {
        fsutil::open(&self.expected_path)
    }

    /// Collects every `<name>.in` in `dir` that has a sibling `<name>.out`.
    /// Testcases are ordered by name (digit runs compare numerically) and
    /// numbered from 1.
    pub fn enumerate(dir: impl AsRef<Path>) -> fsutil::Result<Vec<Self>> {
        let mut found = Vec::new();
        for entry in fsutil::read_dir(&dir)?.filter_map(Result::ok) {
            let Ok(ft) = entry.file_type() else {
                continue
            };
            if ft.is_dir() {
                continue;
            }
            let input = entry.path();
            if input.extension().map_or(true, |ext| ext != Self::INPUT_EXT) {
                continue;
            }
            let Some(name) = input.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue
            };
            let expected = input.with_extension(Self::EXPECTED_EXT);
            if !expected.is_file() {
                log::warn!("Skipping {:?}: missing {:?}", input, expected);
                continue;
            }
            found.push((name, input, expected));
        }

        found.sort_by(|a, b| natural_cmp(&a.0, &b.0));
        Ok(found
            .into_iter()
            .zip(1..)
            .map(|((name, input, expected), index)| Self::new(index, name, input, expected))
            .collect())
    }
}

/// Compares so that `2` < `10` and `sample-2` < `sample-10`.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        let (ca, ra) = split_chunk(a);
        let (cb, rb) = split_chunk(b);
        let ord = match (ca.parse::<u128>(), cb.parse::<u128>()) {
            (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| ca.len().cmp(&cb.len())),
            _ => ca.cmp(cb),
        };
        if ord != Ordering::Equal {
            return ord;
        }
        (a, b) = (ra, rb);
    }
}

/// Splits off the leading run of digits or non-digits.
fn split_chunk(s: &str) -> (&str, &str) {
    let is_digit = s.starts_with(|c: char| c.is_ascii_digit());
    let end = s
        .find(|c: char| c.is_ascii_digit() != is_digit)
        .unwrap_or(s.len());
    s.split_at(end)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn natural_order() {
        let mut names = vec!["10", "2", "sample-10", "sample-2", "1", "a", "01"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, ["1", "01", "2", "10", "a", "sample-2", "sample-10"]);
    }

    #[test]
    fn enumerate_pairs_inputs_with_expected_files() {
        let dir = tempfile::tempdir().unwrap();
        let touch = |name: &str| std::fs::write(dir.path().join(name), "").unwrap();
        for name in ["2.in", "2.out", "10.in", "10.out", "1.in", "1.out", "3.in", "README"] {
            touch(name);
        }
        std::fs::create_dir(dir.path().join("4.in")).unwrap();

        let cases = TestCase::enumerate(dir.path()).unwrap();
        let got: Vec<_> = cases.iter().map(|t| (t.index(), t.name())).collect();
        assert_eq!(got, [(1, "1"), (2, "2"), (3, "10")]);
        assert_eq!(cases[2].input_path(), dir.path().join("10.in"));
        assert_eq!(cases[2].expected_path(), dir.path().join("10.out"));
    }

    #[test]
    fn enumerate_fails_on_missing_dir() {
        assert!(TestCase::enumerate("/nonexistent/testcase/dir").is_err());
    }
}
