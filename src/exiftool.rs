use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

use crate::pose::{Pose, HEADING_FIELD, PITCH_FIELD, ROLL_FIELD};

#[cfg(windows)]
pub const DEFAULT_PROGRAM: &str = "exiftool.exe";
#[cfg(not(windows))]
pub const DEFAULT_PROGRAM: &str = "exiftool";

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0} does not exist")]
    NotFound(PathBuf),
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Something that can persist a pose into an image file.
pub trait PoseWriter {
    fn write_pose(&self, path: &Path, pose: &Pose) -> Result<(), WriteError>;
}

#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
    dry_run: bool,
}

impl ExifTool {
    // A bare name is looked up on PATH.
    pub fn locate(program: &Path) -> Result<ExifTool, ToolError> {
        let resolved = if program.components().count() > 1 {
            program.is_file().then(|| program.to_path_buf())
        } else {
            env::var_os("PATH").and_then(|paths| search_path(program, &paths))
        };
        match resolved {
            Some(program) => {
                debug!(program = %program.display(), "using exiftool");
                Ok(ExifTool { program, dry_run: false })
            }
            None => Err(ToolError::NotFound(program.to_path_buf())),
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(path: &Path, pose: &Pose) -> Vec<OsString> {
        vec![
            "-overwrite_original".into(),
            format!("-XMP-GPano:{HEADING_FIELD}={:?}", pose.heading).into(),
            format!("-XMP-GPano:{PITCH_FIELD}={:?}", pose.pitch).into(),
            format!("-XMP-GPano:{ROLL_FIELD}={:?}", pose.roll).into(),
            path.as_os_str().to_owned(),
        ]
    }
}

impl PoseWriter for ExifTool {
    fn write_pose(&self, path: &Path, pose: &Pose) -> Result<(), WriteError> {
        let args = ExifTool::args(path, pose);
        if self.dry_run {
            info!(program = %self.program.display(), ?args, "dry run, not writing");
            return Ok(());
        }

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| WriteError::Spawn { program: self.program.clone(), source })?;
        if !output.status.success() {
            return Err(WriteError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        debug!(stdout = %String::from_utf8_lossy(&output.stdout).trim(), "exiftool done");
        Ok(())
    }
}

fn search_path(program: &Path, paths: &OsString) -> Option<PathBuf> {
    env::split_paths(paths).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) && candidate.extension().is_none() {
            let exe = candidate.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}
