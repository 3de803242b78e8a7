//! Runs shell commands under a wall-clock limit.
//!
//! Judged runs get their own process group so that a timeout can kill everything
//! the command spawned, not only the shell.

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    time::Instant,
};

#[derive(Debug)]
pub enum Input {
    Null,
    Inherit,
    File(File),
}

#[derive(Debug)]
pub enum Output {
    Discard,
    Inherit,
    Capture { max_bytes: Option<usize> },
    /// Written straight to the file, never buffered in memory.
    File(File),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Normal(i32),
    TimedOut,
    Signaled(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub elapsed: Duration,
    pub exit: ExitKind,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcError {
    #[error("Failed to spawn '{} -c {cmd}'", .shell.to_string_lossy())]
    Spawn {
        shell: PathBuf,
        cmd: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to wait for subprocess")]
    Wait(#[source] io::Error),

    #[error("Failed to read {0} of subprocess")]
    Capture(&'static str, #[source] io::Error),
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    shell: PathBuf,
    own_process_group: bool,
}

impl Input {
    fn into_stdio(self) -> Stdio {
        match self {
            Input::Null => Stdio::null(),
            Input::Inherit => Stdio::inherit(),
            Input::File(f) => Stdio::from(f),
        }
    }
}

impl Output {
    pub const CAPTURE_ALL: Output = Output::Capture { max_bytes: None };

    pub fn capture(max_bytes: usize) -> Self {
        Output::Capture {
            max_bytes: Some(max_bytes),
        }
    }

    fn into_stdio(self) -> Stdio {
        match self {
            Output::Discard => Stdio::null(),
            Output::Inherit => Stdio::inherit(),
            Output::Capture { .. } => Stdio::piped(),
            Output::File(f) => Stdio::from(f),
        }
    }

    fn max_bytes(&self) -> Option<usize> {
        match self {
            Output::Capture { max_bytes } => *max_bytes,
            _ => None,
        }
    }
}

impl ExitKind {
    pub fn is_success(&self) -> bool {
        *self == ExitKind::Normal(0)
    }

    fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitKind::Normal(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt as _;
            if let Some(signo) = status.signal() {
                return ExitKind::Signaled(signo);
            }
        }
        ExitKind::Signaled(0)
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    pub const DEFAULT_SHELL: &str = "/bin/sh";

    pub fn new() -> Self {
        Self {
            shell: Self::DEFAULT_SHELL.into(),
            own_process_group: true,
        }
    }

    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Whether the child is placed in a new process group (the default).
    /// Must be disabled when the child has to read from the controlling terminal.
    pub fn own_process_group(mut self, enabled: bool) -> Self {
        self.own_process_group = enabled;
        self
    }

    pub fn get_shell(&self) -> &Path {
        &self.shell
    }

    pub async fn run(
        &self,
        cmd: &str,
        time_limit: Duration,
        stdin: Input,
        stdout: Output,
        stderr: Output,
    ) -> Result<RunResult, ProcError> {
        let stdout_max_bytes = stdout.max_bytes();
        let stderr_max_bytes = stderr.max_bytes();

        let mut command = Command::new(&self.shell);
        command
            .args(["-c", cmd])
            .stdin(stdin.into_stdio())
            .stdout(stdout.into_stdio())
            .stderr(stderr.into_stdio())
            .kill_on_drop(true);
        #[cfg(unix)]
        {
            if self.own_process_group {
                command.process_group(0);
            }
        }

        let start_at = Instant::now();
        let mut proc = command.spawn().map_err(|source| ProcError::Spawn {
            shell: self.shell.clone(),
            cmd: cmd.to_owned(),
            source,
        })?;
        let pid = proc.id();

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let res = {
            let fut_stdout = drain(proc.stdout.take(), &mut stdout_buf, stdout_max_bytes);
            let fut_stderr = drain(proc.stderr.take(), &mut stderr_buf, stderr_max_bytes);
            let fut_exit = async {
                if self.own_process_group {
                    // The shell stays a zombie until `wait`, which keeps its pgid
                    // reserved while leftover background jobs are killed.
                    wait_exited_unreaped(pid).await;
                    self.kill_group(pid);
                }
                let status = proc.wait().await.map_err(ProcError::Wait)?;
                let exited_at = Instant::now();
                Ok::<_, ProcError>((status, exited_at))
            };

            tokio::time::timeout(time_limit, async {
                tokio::try_join!(
                    fut_exit,
                    async {
                        fut_stdout
                            .await
                            .map_err(|e| ProcError::Capture("stdout", e))
                    },
                    async {
                        fut_stderr
                            .await
                            .map_err(|e| ProcError::Capture("stderr", e))
                    },
                )
            })
            .await
        };

        let (exit, elapsed) = match res {
            Err(_) => {
                self.kill_group(pid);
                proc.kill()
                    .await
                    .unwrap_or_else(|e| log::warn!("Failed to kill TLE process: {:#}", e));
                (ExitKind::TimedOut, start_at.elapsed())
            }
            Ok(Err(e)) => {
                self.kill_group(pid);
                let _ = proc.kill().await;
                return Err(e);
            }
            Ok(Ok(((status, exited_at), _, _))) => (
                ExitKind::from_status(status),
                exited_at.duration_since(start_at),
            ),
        };

        Ok(RunResult {
            elapsed,
            exit,
            stdout: stdout_buf,
            stderr: stderr_buf,
        })
    }

    #[cfg(unix)]
    fn kill_group(&self, pid: Option<u32>) {
        let Some(pid) = pid.filter(|_| self.own_process_group) else {
            return
        };
        let Ok(pgid) = libc::pid_t::try_from(pid) else {
            return
        };
        let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
        if rc != 0 {
            let e = io::Error::last_os_error();
            if e.raw_os_error() != Some(libc::ESRCH) {
                log::warn!("Failed to kill process group {}: {}", pgid, e);
            }
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&self, _pid: Option<u32>) {}
}

/// Blocks until `pid` has exited, leaving it for a later `wait` to reap.
#[cfg(unix)]
async fn wait_exited_unreaped(pid: Option<u32>) {
    let Some(pid) = pid.and_then(|pid| libc::id_t::try_from(pid).ok()) else {
        return
    };
    let res = tokio::task::spawn_blocking(move || loop {
        // SAFETY: siginfo_t is plain data; waitid only writes into it.
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let e = io::Error::last_os_error();
        if e.kind() != io::ErrorKind::Interrupted {
            return Err(e);
        }
    })
    .await;

    match res {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::debug!("waitid({}) failed: {}", pid, e),
        Err(e) => log::debug!("waitid({}) task failed: {}", pid, e),
    }
}

#[cfg(not(unix))]
async fn wait_exited_unreaped(_pid: Option<u32>) {}

/// Reads `reader` to EOF, keeping at most `max_bytes` of it in `buf`.
async fn drain<R>(reader: Option<R>, buf: &mut Vec<u8>, max_bytes: Option<usize>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(())
    };
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        let keep = match max_bytes {
            Some(max) => n.min(max.saturating_sub(buf.len())),
            None => n,
        };
        buf.extend_from_slice(&chunk[..keep]);
    }
}
