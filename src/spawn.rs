//! Fire-and-forget external commands.
//!
//! The event loop never forks itself: commands are handed to a worker thread
//! that starts them through `/bin/sh -c` in their own process group with all
//! standard streams closed, and reaps them as they finish.
use std::{
    os::unix::process::CommandExt,
    process::{Child, Command, Stdio},
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{Context, Result};

const REAP_INTERVAL: Duration = Duration::from_millis(250);

/// Anything able to start a shell command without waiting for it.
pub trait Spawner {
    fn spawn(&self, cmd: &str);
}

pub struct ProcessSpawner {
    tx: Option<Sender<String>>,
    worker: Option<JoinHandle<()>>,
}

impl ProcessSpawner {
    pub fn new() -> Result<ProcessSpawner> {
        let (tx, rx) = mpsc::channel::<String>();
        let worker = thread::Builder::new()
            .name("dina-spawn".into())
            .spawn(move || {
                let mut children: Vec<Child> = Vec::new();
                loop {
                    match rx.recv_timeout(REAP_INTERVAL) {
                        Ok(cmd) => {
                            if let Some(child) = start(&cmd) {
                                children.push(child);
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                    reap(&mut children);
                }
                reap(&mut children);
                if !children.is_empty() {
                    debug!("leaving {} running commands behind", children.len());
                }
            })
            .context("Failed to start the spawn worker")?;

        Ok(ProcessSpawner {
            tx: Some(tx),
            worker: Some(worker),
        })
    }
}

impl Spawner for ProcessSpawner {
    fn spawn(&self, cmd: &str) {
        let sent = self.tx.as_ref().map(|tx| tx.send(cmd.to_string()));
        if !matches!(sent, Some(Ok(()))) {
            warn!("spawn worker is gone, dropping command: {}", cmd);
        }
    }
}

impl Drop for ProcessSpawner {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("spawn worker panicked");
            }
        }
    }
}

/**
 * Run an external command
 *
 * This redirects the process stdin, stdout and stderr to /dev/null.
 * Logs a warning if there were any errors in kicking off the process.
 */
fn start(cmd: &str) -> Option<Child> {
    debug!("spawning: {}", cmd);
    let result = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn();

    match result {
        Ok(child) => Some(child),
        Err(e) => {
            warn!("error spawning external program: {}", e);
            None
        }
    }
}

fn reap(children: &mut Vec<Child>) {
    children.retain_mut(|child| match child.try_wait() {
        Ok(Some(status)) => {
            trace!("child {} exited: {}", child.id(), status);
            false
        }
        Ok(None) => true,
        Err(e) => {
            warn!("unable to poll child {}: {}", child.id(), e);
            false
        }
    });
}
