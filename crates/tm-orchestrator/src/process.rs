//! Supervised tunnel child processes
//!
//! A [`TunnelProcess`] owns one spawned executable. Its stdout and stderr are
//! read line by line by two reader tasks that feed a single channel, which the
//! owner consumes through [`OutputLines`]. The channel closes once both streams
//! reach EOF, which is how callers observe that the process went away.
//!
//! Termination is bounded: SIGTERM, wait up to the grace period, then SIGKILL
//! and wait once more. The child is also killed if the handle is dropped.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use tm_core::error::{Result, TunnelError};

/// Capacity of the merged output channel
const OUTPUT_BUFFER: usize = 256;

/// Combined stdout/stderr of a tunnel process, one line at a time
pub struct OutputLines {
    rx: mpsc::Receiver<String>,
}

impl OutputLines {
    /// Next output line, or `None` once both streams have closed
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// A running tunnel executable
pub struct TunnelProcess {
    /// Label used in logs (the target URL or "named-tunnel")
    label: String,
    /// OS process id captured at spawn
    pid: Option<u32>,
    /// Child handle; locked for wait/try_wait/kill
    child: Mutex<Child>,
    /// stdout/stderr reader tasks
    readers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl TunnelProcess {
    /// Spawn `program` with `args`, inheriting the environment
    pub fn spawn<I, S>(
        program: &Path,
        args: I,
        label: impl Into<String>,
    ) -> Result<(Self, OutputLines)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let label = label.into();

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TunnelError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        let pid = child.id();
        tracing::debug!(tunnel = %label, pid = ?pid, "Spawned {:?}", program);

        let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, tx.clone(), label.clone(), "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, tx, label.clone(), "stderr"));
        }

        let process = Self {
            label,
            pid,
            child: Mutex::new(child),
            readers: std::sync::Mutex::new(readers),
        };

        Ok((process, OutputLines { rx }))
    }

    /// Log label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// OS process id
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Non-blocking check whether the process has exited (reaps it if so)
    pub async fn has_exited(&self) -> bool {
        let mut child = self.child.lock().await;
        match child.try_wait() {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(tunnel = %self.label, "Failed to poll process status: {}", e);
                false
            }
        }
    }

    /// Terminate the process and wait for it to exit.
    ///
    /// Returns immediately if the process already exited. Sends SIGTERM, waits
    /// up to `grace`, then escalates to SIGKILL and waits up to `grace` again.
    pub async fn terminate(&self, grace: Duration) -> Result<ExitStatus> {
        let status = {
            let mut child = self.child.lock().await;
            if let Some(status) = child.try_wait()? {
                status
            } else {
                self.signal_terminate(&mut child)?;

                match tokio::time::timeout(grace, child.wait()).await {
                    Ok(status) => status?,
                    Err(_) => {
                        tracing::warn!(
                            tunnel = %self.label,
                            "Process did not exit within {:?} of SIGTERM, killing",
                            grace
                        );
                        child.start_kill()?;
                        match tokio::time::timeout(grace, child.wait()).await {
                            Ok(status) => status?,
                            Err(_) => {
                                tracing::error!(
                                    tunnel = %self.label,
                                    pid = ?self.pid,
                                    "Process survived SIGKILL for {:?}",
                                    grace
                                );
                                return Err(TunnelError::TerminateTimeout {
                                    label: self.label.clone(),
                                    waited: grace * 2,
                                });
                            }
                        }
                    }
                }
            }
        };

        self.abort_readers();
        tracing::debug!(tunnel = %self.label, "Process exited with {}", status);
        Ok(status)
    }

    #[cfg(unix)]
    fn signal_terminate(&self, child: &mut Child) -> Result<()> {
        match child.id() {
            Some(pid) => {
                // SAFETY: plain signal delivery to a pid we spawned and have not reaped
                let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
                if rc != 0 {
                    let err = std::io::Error::last_os_error();
                    if err.raw_os_error() != Some(libc::ESRCH) {
                        return Err(err.into());
                    }
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    #[cfg(not(unix))]
    fn signal_terminate(&self, child: &mut Child) -> Result<()> {
        child.start_kill()?;
        Ok(())
    }

    /// Stop the output readers; a grandchild holding the pipes open must not keep them alive
    fn abort_readers(&self) {
        if let Ok(mut readers) = self.readers.lock() {
            for reader in readers.drain(..) {
                reader.abort();
            }
        }
    }
}

impl Drop for TunnelProcess {
    fn drop(&mut self) {
        self.abort_readers();
    }
}

fn spawn_reader<R>(
    stream: R,
    tx: mpsc::Sender<String>,
    label: String,
    stream_name: &'static str,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    // The executable is opaque; tolerate bytes that are not UTF-8
                    let line = String::from_utf8_lossy(&buf).trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if tx.send(line).await.is_err() {
                        // Owner dropped the line stream
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(tunnel = %label, "Error reading {}: {}", stream_name, e);
                    break;
                }
            }
        }
    })
}
