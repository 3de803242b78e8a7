use std::{collections::HashMap, ffi::OsStr, path::Path, time::Duration};

use anyhow::bail;

use crate::{
    proc::{ExitKind, Input, Output, ProcessRunner},
    str_interp::{interp, InterpError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCommand {
    pub compile: Option<String>,
    pub run: String,
}

impl TestCommand {
    const COMPILE_TIME_LIMIT: Duration = Duration::from_secs(600);

    pub fn new(compile: Option<String>, run: impl Into<String>) -> Self {
        Self {
            compile,
            run: run.into(),
        }
    }

    /// Expands `#{filePath}`, `#{fileName}`, `#{fileDir}`, `#{fileStem}` and
    /// `#{fileExt}` in both commands.
    pub fn interpolate_with_program_file(
        self,
        filepath: impl AsRef<Path>,
    ) -> Result<Self, InterpError> {
        let vars = Self::make_interp_vars(filepath.as_ref());
        Ok(Self {
            compile: self.compile.map(|fmt| interp(&fmt, &vars)).transpose()?,
            run: interp(&self.run, &vars)?,
        })
    }

    fn make_interp_vars(filepath: &Path) -> HashMap<&'static str, &OsStr> {
        let mut m: HashMap<_, &OsStr> = HashMap::new();
        m.insert("filePath", filepath.as_os_str());
        m.insert(
            "fileName",
            filepath
                .file_name()
                .unwrap_or(OsStr::new("UNDEFINED_FILE_NAME")),
        );
        m.insert(
            "fileDir",
            match filepath.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.as_os_str(),
                _ => OsStr::new("."),
            },
        );
        m.insert(
            "fileStem",
            filepath
                .file_stem()
                .unwrap_or(OsStr::new("UNDEFINED_FILE_STEM")),
        );
        m.insert(
            "fileExt",
            filepath
                .extension()
                .unwrap_or(OsStr::new("UNDEFINED_FILE_EXTENSION")),
        );
        m
    }

    pub fn is_compile_cmd_defined(&self) -> bool {
        self.compile.is_some()
    }

    /// Runs the compile command with the terminal attached, so compiler
    /// diagnostics reach the user directly.
    pub async fn compile(&self, runner: &ProcessRunner) -> anyhow::Result<()> {
        let Some(cmd) = &self.compile else {
            bail!("Undefined compile command")
        };

        let res = runner
            .run(
                cmd,
                Self::COMPILE_TIME_LIMIT,
                Input::Null,
                Output::Inherit,
                Output::Inherit,
            )
            .await?;

        match res.exit {
            ExitKind::Normal(0) => Ok(()),
            ExitKind::Normal(code) => bail!("Compile error: exitcode={}", code),
            ExitKind::Signaled(signo) => bail!("Failed to compile: terminated by signal {}", signo),
            ExitKind::TimedOut => bail!(
                "Failed to compile: not finished within {}s",
                Self::COMPILE_TIME_LIMIT.as_secs()
            ),
        }
    }
}
