//! A stand-in `aws` executable that records its arguments.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use deploy_core::aws::AwsCli;
use deploy_core::credentials::AccessKeys;

pub struct FakeAws {
    dir: TempDir,
    program: PathBuf,
    log: PathBuf,
}

impl FakeAws {
    /// `body` runs after the arguments are logged; `$1 $2` are the service
    /// and operation.
    pub fn new(body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let program = dir.path().join("aws");
        let log = dir.path().join("calls.log");
        let script = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$*\" >> '{}'\n{}\n",
            log.display(),
            body
        );
        std::fs::write(&program, script).unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir, program, log }
    }

    /// Succeeds with no output for every call.
    pub fn ok() -> Self {
        Self::new("exit 0")
    }

    pub fn cli(&self) -> AwsCli {
        AwsCli::new("us-east-1", AccessKeys::new("AKIATEST", "secret")).with_program(
            self.program.display().to_string(),
        )
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Argument lines in call order.
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
