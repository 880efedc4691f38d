use anyhow::{Context, Result};
use gatecheck_core::ConnectOptions;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Isolated directory for traffic dumps and config files
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Create an empty workspace
    pub fn empty() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        Ok(Self { dir })
    }

    /// Get workspace path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the workspace
    pub fn file(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Write file to workspace
    pub fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.file(name);
        fs::write(&path, content).with_context(|| format!("Failed to write file: {}", name))?;
        Ok(path)
    }

    /// Connect options that dump traffic to `name`
    pub fn dumping_options(&self, name: &str) -> ConnectOptions {
        ConnectOptions {
            traffic_dump: Some(self.file(name)),
            ..test_options()
        }
    }

    /// Parse a JSON-lines traffic dump
    pub fn read_dump(&self, name: &str) -> Result<Vec<Value>> {
        let content = fs::read_to_string(self.file(name))
            .with_context(|| format!("Failed to read dump: {}", name))?;
        content
            .lines()
            .map(|line| serde_json::from_str(line).context("Dump line is not JSON"))
            .collect()
    }
}

/// Short timeouts so a wedged engine fails the test instead of hanging it
pub fn test_options() -> ConnectOptions {
    ConnectOptions {
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(5),
        traffic_dump: None,
    }
}
