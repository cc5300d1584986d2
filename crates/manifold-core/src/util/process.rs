//! External tool execution.

use manifold_types::{ManifoldError, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

/// An external command-line tool.
#[derive(Debug, Clone)]
pub struct Tool {
    name: String,
    binary: PathBuf,
}

impl Tool {
    /// Create a tool from its display name and binary path.
    pub fn new(name: impl Into<String>, binary: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            binary: binary.as_ref().to_path_buf(),
        }
    }

    /// Display name of the tool.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the tool and return its standard output.
    ///
    /// A non-zero exit status becomes a [`ManifoldError::Tool`] carrying the
    /// tool's standard error.
    pub fn run<I, S>(&self, args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("Running {}", self.name);
        trace!("  {:?}", cmd);

        let output = cmd.output().map_err(|e| ManifoldError::Tool {
            tool: self.name.clone(),
            message: format!("failed to run {}: {}", self.binary.display(), e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ManifoldError::Tool {
                tool: self.name.clone(),
                message: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        debug!("{} produced {} bytes", self.name, output.stdout.len());
        Ok(output.stdout)
    }
}
