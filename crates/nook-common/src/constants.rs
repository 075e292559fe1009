//! System-wide constants and default paths.

/// Default directory holding image archives, base layers, write layers
/// and merged mount points.
pub const DEFAULT_ROOT_DIR: &str = "/var/lib/nook";

/// Default directory holding one record directory per container name.
pub const DEFAULT_STATE_DIR: &str = "/var/run/nook";

/// Default parent of every per-container cgroup path.
pub const DEFAULT_CGROUP_PARENT: &str = "nook";

/// Mount table scanned to locate cgroup subsystem hierarchies.
pub const DEFAULT_MOUNTINFO: &str = "/proc/self/mountinfo";

/// Root of the process pseudo-filesystem.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Path used to re-invoke the running executable.
pub const SELF_EXE: &str = "/proc/self/exe";

/// Name of the record file inside a container's state directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Name of the stdout capture file inside a container's state directory.
pub const LOG_FILE_NAME: &str = "container.log";

/// Subdirectory of the root holding per-container write layers.
pub const WRITE_LAYER_DIR: &str = "writeLayer";

/// Subdirectory of the root holding per-container merged mount points.
pub const MOUNT_DIR: &str = "mnt";

/// Extension of image archives stored under the root directory.
pub const IMAGE_ARCHIVE_EXTENSION: &str = "tar";

/// File descriptor on which the init stage receives the handoff pipe.
pub const HANDOFF_FD: i32 = 3;

/// Side-channel marker carrying the target pid of an exec.
pub const EXEC_PID_ENV: &str = "NOOK_EXEC_PID";

/// Side-channel marker carrying the target command string of an exec.
pub const EXEC_CMD_ENV: &str = "NOOK_EXEC_CMD";

/// Length of generated container identifiers.
pub const CONTAINER_ID_LENGTH: usize = 10;

/// Timestamp layout used for `createdTime`.
pub const CREATED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
