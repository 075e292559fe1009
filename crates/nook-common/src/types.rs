//! Domain primitive types used across the nook workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Short random identifier of a container instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random lowercase alphanumeric container ID.
    #[must_use]
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(crate::constants::CONTAINER_ID_LENGTH);
        Self(id)
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status recorded for a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// The init process was launched and handed its command.
    Running,
    /// An operator stopped the container.
    Stopped,
    /// The workload ended while the parent was attached.
    Exited,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// Per-invocation resource limits. `None` leaves a dimension unconstrained.
///
/// Values are written verbatim to the subsystem control files, so a
/// memory limit may use the kernel's suffixes (`100m`, `1g`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Value for `memory.limit_in_bytes`.
    pub memory_limit: Option<String>,
    /// Value for `cpu.shares`.
    pub cpu_share: Option<String>,
    /// Value for `cpuset.cpus`.
    pub cpu_set: Option<String>,
}
