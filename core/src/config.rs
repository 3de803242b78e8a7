use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::time::Duration;

use anyhow::Context as _;
use rust_embed::RustEmbed;
use serde::{Deserialize, Deserializer};

use crate::fsutil;
use crate::testing::{Checker, TestCommand, TestRunner};

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    #[serde(default)]
    pub test: TestConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestConfig {
    pub shell: PathBuf,
    pub time_limit_ms: u64,
    pub parallelism: usize,
    pub testcase_dir: PathBuf,
    #[serde(deserialize_with = "deserialize_opt_glob")]
    pub include: Option<glob::Pattern>,
    pub checker: String,
    pub stderr_capture_max_bytes: usize,
    pub compile_before_run: bool,
    pub command: Vec<TestCommandConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCommandConfig {
    #[serde(deserialize_with = "deserialize_glob")]
    pub pattern: glob::Pattern,
    pub compile: Option<String>,
    pub run: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            shell: crate::proc::ProcessRunner::DEFAULT_SHELL.into(),
            time_limit_ms: u64::try_from(TestRunner::DEFAULT_TIME_LIMIT.as_millis())
                .unwrap_or(u64::MAX),
            parallelism: 1,
            testcase_dir: "testcase".into(),
            include: None,
            checker: Checker::DEFAULT_TEMPLATE.to_owned(),
            stderr_capture_max_bytes: TestRunner::DEFAULT_STDERR_CAPTURE_MAX_BYTES,
            compile_before_run: true,
            command: Vec::new(),
        }
    }
}

fn deserialize_glob<'de, D>(deserializer: D) -> StdResult<glob::Pattern, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    glob::Pattern::new(&s).map_err(serde::de::Error::custom)
}

fn deserialize_opt_glob<'de, D>(deserializer: D) -> StdResult<Option<glob::Pattern>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_glob(deserializer).map(Some)
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

impl Config {
    pub const FILENAME: &str = "cptest.toml";

    pub fn example_toml() -> Option<String> {
        let file = Asset::get(Self::FILENAME)?;
        Some(String::from_utf8_lossy(file.data.as_ref()).into_owned())
    }

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_toml_file(filepath: PathBuf) -> anyhow::Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let mut cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Find config file ancestor dirs, including current dir.
    pub fn find_file_in_ancestors(cur_dir: impl AsRef<Path>) -> Option<PathBuf> {
        cur_dir
            .as_ref()
            .ancestors()
            .map(|dir| dir.join(Self::FILENAME))
            .find(|path| path.is_file())
    }

    /// Loads the nearest config file, or the defaults when there is none.
    pub fn load(cur_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        match Self::find_file_in_ancestors(cur_dir) {
            Some(path) => {
                log::info!("Using config {:?}", path);
                Self::from_toml_file(path)
            }
            None => {
                log::info!("No {} found; using default settings", Self::FILENAME);
                Ok(Self::default())
            }
        }
    }
}

impl TestConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }

    pub fn find_test_cmd_for_filename(&self, filename: impl AsRef<str>) -> Option<TestCommand> {
        self.command
            .iter()
            .find(|entry| entry.pattern.matches(filename.as_ref()))
            .map(|entry| TestCommand::new(entry.compile.to_owned(), entry.run.to_owned()))
    }

    /// Whether `filename` looks like a program file to test.
    pub fn is_program_file(&self, filename: &str) -> bool {
        match &self.include {
            Some(pattern) => pattern.matches(filename),
            None => self.command.iter().any(|e| e.pattern.matches(filename)),
        }
    }
}
