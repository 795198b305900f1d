//! Launching new worker processes.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::config::SpawnConfig;

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("cannot locate current executable: {0}")]
    CurrentExe(#[source] io::Error),

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Starts one new worker.
///
/// Fire and forget: the worker joins the fleet by registering itself, so
/// success here only means the launch was accepted.
pub trait Spawner: Send + Sync {
    fn spawn_worker(&self) -> Result<(), SpawnError>;
}

/// Runs a worker as a child process of the master.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessSpawner {
    /// Worker command line: configured extra args, then the flags that make
    /// the child a worker of this master.
    pub fn from_config(
        config: &SpawnConfig,
        master_url: &str,
        config_path: Option<&Path>,
    ) -> Result<Self, SpawnError> {
        let program = match &config.program {
            Some(p) => PathBuf::from(p),
            None => std::env::current_exe().map_err(SpawnError::CurrentExe)?,
        };

        let mut args = config.extra_args.clone();
        args.extend([
            "--mode".to_string(),
            "worker".to_string(),
            "--master".to_string(),
            master_url.to_string(),
            "--bind".to_string(),
            config.worker_bind.clone(),
        ]);
        if let Some(path) = config_path {
            args.push("--config".to_string());
            args.push(path.display().to_string());
        }

        Ok(Self { program, args })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Spawner for ProcessSpawner {
    fn spawn_worker(&self) -> Result<(), SpawnError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SpawnError::Launch {
                program: self.program.display().to_string(),
                source,
            })?;

        let pid = child.id();
        tracing::info!(pid, program = %self.program.display(), "Worker process launched");

        // Reap the child so it does not linger as a zombie.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => tracing::info!(pid, %status, "Worker process exited"),
                Err(e) => tracing::warn!(pid, error = %e, "Failed to wait on worker process"),
            }
        });

        Ok(())
    }
}
