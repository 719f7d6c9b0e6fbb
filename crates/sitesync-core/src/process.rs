use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result};

const DEFAULT_MAX_CAPTURE_BYTES: usize = 1024 * 1024;

fn max_capture_bytes() -> usize {
    std::env::var("SITESYNC_MAX_CAPTURE_BYTES")
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_MAX_CAPTURE_BYTES)
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputRedirect {
    pub path: String,
    pub append: bool,
}

/// One external program invocation with optional file redirections. Paths in
/// the redirections are interpreted on the host that executes the job, which
/// for ssh targets is the remote side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShellJob {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdin: Option<String>,
    pub stdout: Option<OutputRedirect>,
}

impl ShellJob {
    pub fn command(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            stdout: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    #[must_use]
    pub fn stdin_path(mut self, path: impl Into<String>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    #[must_use]
    pub fn stdout_path(mut self, path: impl Into<String>, append: bool) -> Self {
        self.stdout = Some(OutputRedirect {
            path: path.into(),
            append,
        });
        self
    }

    /// The job as a single quoted shell line, suitable for handing to a
    /// remote shell over ssh.
    #[must_use]
    pub fn rendered(&self) -> String {
        let mut parts = Vec::new();
        for (key, value) in &self.env {
            parts.push(format!("{key}={}", shell_quote(value)));
        }
        parts.push(shell_quote(&self.program));
        for arg in &self.args {
            parts.push(shell_quote(arg));
        }
        if let Some(path) = &self.stdin {
            parts.push(format!("< {}", shell_quote(path)));
        }
        if let Some(redirect) = &self.stdout {
            let op = if redirect.append { ">>" } else { ">" };
            parts.push(format!("{op} {}", shell_quote(&redirect.path)));
        }
        parts.join(" ")
    }
}

impl From<sitesync_domain::ClientJob> for ShellJob {
    fn from(job: sitesync_domain::ClientJob) -> Self {
        Self {
            program: job.program,
            args: job.args,
            env: job.env,
            stdin: None,
            stdout: None,
        }
    }
}

/// Quotes `value` for a POSIX shell. Plain words pass through untouched.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Execute `job` on this host and capture stdout/stderr.
///
/// # Errors
///
/// Returns an error when the program cannot be spawned, a redirection file
/// cannot be opened, or the I/O streams cannot be read entirely.
pub fn run_job(job: &ShellJob, cwd: &Path) -> Result<RunOutput> {
    let mut command = Command::new(&job.program);
    command.args(&job.args);
    for (key, value) in &job.env {
        command.env(key, value);
    }
    command.current_dir(cwd);

    match &job.stdin {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("failed to open {path}"))?;
            command.stdin(Stdio::from(file));
        }
        None => {
            command.stdin(Stdio::null());
        }
    }
    let capture_stdout = match &job.stdout {
        Some(redirect) => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .append(redirect.append)
                .truncate(!redirect.append)
                .open(&redirect.path)
                .with_context(|| format!("failed to open {}", redirect.path))?;
            command.stdout(Stdio::from(file));
            false
        }
        None => {
            command.stdout(Stdio::piped());
            true
        }
    };
    command.stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .with_context(|| format!("failed to start {}", job.program))?;
    let limit = max_capture_bytes();
    let stdout_handle = if capture_stdout {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("stdout missing for {}", job.program))?;
        Some(thread::spawn(move || read_to_string_limited(stdout, limit)))
    } else {
        None
    };
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow::anyhow!("stderr missing for {}", job.program))?;
    let stderr_handle = thread::spawn(move || read_to_string_limited(stderr, limit));

    let status = child
        .wait()
        .with_context(|| format!("failed to wait for {}", job.program))?;
    let code = status.code().unwrap_or(-1);
    let (mut stdout, stdout_truncated) = match stdout_handle {
        Some(handle) => handle
            .join()
            .map_err(|_| anyhow::anyhow!("stdout thread panicked"))??,
        None => (String::new(), false),
    };
    let (mut stderr, stderr_truncated) = stderr_handle
        .join()
        .map_err(|_| anyhow::anyhow!("stderr thread panicked"))??;
    if stdout_truncated {
        stdout.push_str("\n[...truncated...]\n");
    }
    if stderr_truncated {
        stderr.push_str("\n[...truncated...]\n");
    }
    Ok(RunOutput {
        code,
        stdout,
        stderr,
    })
}

fn read_to_string_limited(mut reader: impl Read, limit: usize) -> Result<(String, bool)> {
    let mut buffer = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 8192];
    loop {
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        append_limited(&mut buffer, &chunk[..read], limit, &mut truncated);
    }
    Ok((String::from_utf8_lossy(&buffer).to_string(), truncated))
}

fn append_limited(buffer: &mut Vec<u8>, chunk: &[u8], limit: usize, truncated: &mut bool) {
    if limit == 0 {
        return;
    }
    if buffer.len().saturating_add(chunk.len()) <= limit {
        buffer.extend_from_slice(chunk);
        return;
    }
    *truncated = true;
    let old_len = buffer.len();
    let excess = old_len.saturating_add(chunk.len()).saturating_sub(limit);
    if excess >= old_len {
        buffer.clear();
        let drop_from_chunk = excess.saturating_sub(old_len).min(chunk.len());
        buffer.extend_from_slice(&chunk[drop_from_chunk..]);
    } else {
        buffer.drain(0..excess);
        buffer.extend_from_slice(chunk);
    }
}
