use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::exiftool::{PoseWriter, WriteError};
use crate::orientation::{Command, Effect, Orientation};
use crate::pose::Pose;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Interactive,
    Terminated,
}

pub struct Session {
    path: PathBuf,
    orientation: Orientation,
    sensitivity: f64,
    writer: Box<dyn PoseWriter>,
    state: State,
}

impl Session {
    pub fn new(path: PathBuf, pose: Pose, writer: Box<dyn PoseWriter>, sensitivity: f64) -> Self {
        let orientation = Orientation::from_pose(pose);
        info!(path = %path.display(), correction = %orientation.correction(), "session started");
        Self {
            path,
            orientation,
            sensitivity,
            writer,
            state: State::Interactive,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn orientation(&self) -> &Orientation {
        &self.orientation
    }

    pub fn drag(&mut self, dx: f64, dy: f64) -> bool {
        if self.state != State::Interactive {
            return false;
        }
        self.orientation.drag(dx, dy, self.sensitivity);
        true
    }

    pub fn apply(&mut self, command: Command) -> Option<Effect> {
        if self.state != State::Interactive {
            warn!(?command, "ignoring input after exit");
            return None;
        }
        Some(self.orientation.apply(command))
    }

    /// Only the first call writes; later calls return `None`.
    pub fn terminate(&mut self) -> Option<Result<Pose, WriteError>> {
        if self.state == State::Terminated {
            return None;
        }
        self.state = State::Terminated;

        let pose = self.orientation.correction();
        info!(path = %self.path.display(), correction = %pose, "writing correction");
        Some(self.writer.write_pose(&self.path, &pose).map(|()| pose))
    }
}
