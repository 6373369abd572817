//! Worker processes driven over stdin/stdout pipes.
use std::ffi::OsString;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use tracing::{debug, warn};

use crate::batch::protocol::{TaskReply, TaskRequest, read_message, write_message};
use crate::batch::{Worker, WorkerFactory};
use crate::error::{Error, Result};

/// Hidden command line flag that turns the binary into a worker.
pub const WORKER_FLAG: &str = "--worker";

/// Spawns `program args...` once per worker slot.
#[derive(Debug, Clone)]
pub struct ProcessWorkerFactory {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessWorkerFactory {
    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Re-launch the running executable in worker mode.
    pub fn current_exe(log: bool) -> Result<Self> {
        let exe = std::env::current_exe()?;
        let mut args = vec![OsString::from(WORKER_FLAG)];
        if log {
            args.push(OsString::from("--log"));
        }
        Ok(Self::new(exe, args))
    }
}

impl WorkerFactory for ProcessWorkerFactory {
    type Worker = ProcessWorker;

    fn spawn(&self, slot: usize) -> Result<ProcessWorker> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Worker(format!("failed to spawn {:?}: {}", self.program, e)))?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Worker("worker pipes unavailable".into()));
        };
        debug!("Worker slot {} spawned as pid {}", slot, child.id());
        Ok(ProcessWorker {
            slot,
            child,
            stdin: Some(BufWriter::new(stdin)),
            stdout: BufReader::new(stdout),
            healthy: true,
        })
    }
}

/// Handle on one live worker process.
#[derive(Debug)]
pub struct ProcessWorker {
    slot: usize,
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
    healthy: bool,
}

impl ProcessWorker {
    fn exchange(&mut self, request: &TaskRequest) -> Result<TaskReply> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Worker("worker input already closed".into()))?;
        write_message(stdin, request)?;
        let reply: TaskReply = read_message(&mut self.stdout)?.ok_or_else(|| {
            Error::Worker(format!(
                "worker pid {} exited while processing item {}",
                self.child.id(),
                request.index
            ))
        })?;
        if reply.index != request.index {
            return Err(Error::Worker(format!(
                "worker answered item {} for request {}",
                reply.index, request.index
            )));
        }
        Ok(reply)
    }
}

impl Worker for ProcessWorker {
    fn process(&mut self, request: &TaskRequest) -> Result<TaskReply> {
        let reply = self.exchange(request);
        if reply.is_err() {
            self.healthy = false;
        }
        reply
    }
}

impl Drop for ProcessWorker {
    fn drop(&mut self) {
        // closing stdin ends a healthy worker's loop
        drop(self.stdin.take());
        if !self.healthy {
            let _ = self.child.kill();
        }
        match self.child.wait() {
            Ok(status) => debug!("Worker slot {} exited: {}", self.slot, status),
            Err(e) => warn!("Worker slot {} could not be reaped: {}", self.slot, e),
        }
    }
}
