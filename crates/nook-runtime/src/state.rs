//! Persistent container registry.
//!
//! One directory per container name under the state directory, holding a
//! `config.json` record and the container's log file. Records are created
//! without clobbering and rewritten through a rename, so a reader never
//! sees a partially written record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use nook_common::constants::{CONFIG_FILE_NAME, CREATED_TIME_FORMAT, LOG_FILE_NAME};
use nook_common::error::{NookError, Result};
use nook_common::types::{ContainerId, ContainerStatus};
use serde::{Deserialize, Serialize};

/// Persistent record of a container's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Host PID of the init process.
    pub pid: String,
    /// Random short identifier.
    pub id: ContainerId,
    /// Unique name, keys the record directory.
    pub name: String,
    /// Space-joined command line.
    pub command: String,
    /// Local creation time.
    #[serde(rename = "createdTime", alias = "createTime")]
    pub created_time: String,
    /// Current lifecycle status.
    pub status: ContainerStatus,
    /// Raw `source:target` volume spec, empty when none.
    #[serde(default)]
    pub volume: String,
}

impl ContainerRecord {
    /// Creates a `running` record stamped with the current local time.
    #[must_use]
    pub fn running(id: ContainerId, name: &str, pid: u32, command: &[String], volume: Option<&str>) -> Self {
        Self {
            pid: pid.to_string(),
            id,
            name: name.to_string(),
            command: command.join(" "),
            created_time: chrono::Local::now().format(CREATED_TIME_FORMAT).to_string(),
            status: ContainerStatus::Running,
            volume: volume.unwrap_or_default().to_string(),
        }
    }

    /// Returns the volume spec, or `None` when empty.
    #[must_use]
    pub fn volume_spec(&self) -> Option<&str> {
        Some(self.volume.as_str()).filter(|v| !v.is_empty())
    }
}

/// Rejects names that are not a single path component.
///
/// # Errors
///
/// Returns a configuration error for an invalid name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(NookError::Config {
            message: format!("invalid container name: {name:?}"),
        });
    }
    Ok(())
}

/// On-disk index of containers keyed by name.
#[derive(Debug, Clone)]
pub struct Registry {
    state_dir: PathBuf,
}

impl Registry {
    /// Opens the registry rooted at `state_dir`.
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    /// Directory holding one container's record and log.
    #[must_use]
    pub fn container_dir(&self, name: &str) -> PathBuf {
        self.state_dir.join(name)
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.container_dir(name).join(CONFIG_FILE_NAME)
    }

    /// Path of the container's log file.
    #[must_use]
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.container_dir(name).join(LOG_FILE_NAME)
    }

    /// Fails if a record already exists under `name`.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` for a taken name, or a configuration error
    /// for an invalid one.
    pub fn ensure_available(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        if self.record_path(name).exists() {
            return Err(NookError::AlreadyExists {
                kind: "container",
                id: name.to_string(),
            });
        }
        Ok(())
    }

    /// Persists a new record.
    ///
    /// The record is written to a temporary file and hard-linked into
    /// place, so an existing record is never overwritten.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if another record holds the name, or an
    /// I/O error if the directory or file cannot be written.
    pub fn create(&self, record: &ContainerRecord) -> Result<()> {
        validate_name(&record.name)?;
        let dir = self.container_dir(&record.name);
        std::fs::create_dir_all(&dir).map_err(|e| NookError::io(&dir, e))?;

        let staged = dir.join(format!(".{CONFIG_FILE_NAME}.{}", record.id));
        write_json(&staged, record)?;
        let target = self.record_path(&record.name);
        let linked = std::fs::hard_link(&staged, &target);
        if let Err(e) = std::fs::remove_file(&staged) {
            tracing::warn!(path = %staged.display(), error = %e, "failed to remove staged record");
        }
        match linked {
            Ok(()) => {
                tracing::debug!(name = %record.name, pid = %record.pid, "record created");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(NookError::AlreadyExists {
                kind: "container",
                id: record.name.clone(),
            }),
            Err(e) => Err(NookError::io(target, e)),
        }
    }

    /// Reads the record stored under `name`.
    ///
    /// A record that cannot be read or parsed is treated like a missing
    /// one; the cause is logged.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no usable record exists, or a configuration
    /// error for an invalid name.
    pub fn lookup(&self, name: &str) -> Result<ContainerRecord> {
        validate_name(name)?;
        let path = self.record_path(name);
        read_record(&path).map_err(|e| {
            if path.exists() {
                tracing::warn!(name, path = %path.display(), error = %e, "unusable container record");
            } else {
                tracing::debug!(name, "no record");
            }
            NookError::NotFound {
                kind: "container",
                id: name.to_string(),
            }
        })
    }

    /// Lists every parsable record, ordered by name.
    ///
    /// Unparsable records are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory exists but cannot be read.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        let entries = match std::fs::read_dir(&self.state_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(NookError::io(&self.state_dir, e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| NookError::io(&self.state_dir, e))?;
            let path = entry.path().join(CONFIG_FILE_NAME);
            if !path.is_file() {
                continue;
            }
            match read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable record"),
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    /// Rewrites the status of the record under `name`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record exists, or an error if the new
    /// record cannot be written.
    pub fn update_status(&self, name: &str, status: ContainerStatus) -> Result<ContainerRecord> {
        let mut record = self.lookup(name)?;
        record.status = status;

        let target = self.record_path(name);
        let staged = target.with_extension("json.tmp");
        write_json(&staged, &record)?;
        std::fs::rename(&staged, &target).map_err(|e| NookError::io(&target, e))?;
        tracing::debug!(name, %status, "record status updated");
        Ok(record)
    }

    /// Deletes the directory of `name`, including its log.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the directory is absent, or an I/O error.
    pub fn remove(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let dir = self.container_dir(name);
        std::fs::remove_dir_all(&dir).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                NookError::NotFound {
                    kind: "container",
                    id: name.to_string(),
                }
            } else {
                NookError::io(&dir, e)
            }
        })?;
        tracing::debug!(name, "record removed");
        Ok(())
    }
}

fn read_record(path: &Path) -> Result<ContainerRecord> {
    let raw = std::fs::read(path).map_err(|e| NookError::io(path, e))?;
    Ok(serde_json::from_slice(&raw)?)
}

fn write_json(path: &Path, record: &ContainerRecord) -> Result<()> {
    let json = serde_json::to_vec(record)?;
    std::fs::write(path, json).map_err(|e| NookError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ContainerRecord {
        ContainerRecord::running(
            ContainerId::new("a1b2c3d4e5"),
            name,
            4242,
            &["/bin/sleep".into(), "100".into()],
            None,
        )
    }

    #[test]
    fn create_then_lookup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = Registry::new(dir.path());
        registry.create(&record("web")).expect("create");

        let found = registry.lookup("web").expect("lookup");
        assert_eq!(found.pid, "4242");
        assert_eq!(found.command, "/bin/sleep 100");
        assert_eq!(found.status, ContainerStatus::Running);
        assert!(found.volume_spec().is_none());
    }

    #[test]
    fn record_json_uses_wire_field_names() {
        let json = serde_json::to_value(record("web")).expect("serialize");
        for key in ["pid", "id", "name", "command", "createdTime", "status", "volume"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["status"], "running");
    }

    #[test]
    fn legacy_create_time_key_is_accepted() {
        let raw = r#"{"pid":"7","id":"x","name":"old","command":"sh","createTime":"2020-01-01 00:00:00","status":"stopped","volume":""}"#;
        let parsed: ContainerRecord = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.created_time, "2020-01-01 00:00:00");
        assert_eq!(parsed.status, ContainerStatus::Stopped);
    }

    #[test]
    fn create_never_clobbers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = Registry::new(dir.path());
        registry.create(&record("web")).expect("first");

        let mut other = record("web");
        other.pid = "1".into();
        let err = registry.create(&other).expect_err("second create");
        assert!(matches!(err, NookError::AlreadyExists { .. }));
        assert_eq!(registry.lookup("web").unwrap().pid, "4242");
        assert!(registry.ensure_available("web").is_err());
    }

    #[test]
    fn lookup_unknown_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = Registry::new(dir.path());
        assert!(registry.lookup("ghost").expect_err("missing").is_not_found());
        assert!(registry.remove("ghost").expect_err("missing").is_not_found());
    }

    #[test]
    fn lookup_of_corrupt_record_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = Registry::new(dir.path());
        std::fs::create_dir_all(dir.path().join("broken")).expect("mkdir");
        std::fs::write(dir.path().join("broken").join(CONFIG_FILE_NAME), "{not json").expect("write");

        let err = registry.lookup("broken").expect_err("corrupt");
        assert!(err.is_not_found());
    }

    #[test]
    fn list_skips_unparsable_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = Registry::new(dir.path());
        registry.create(&record("b")).expect("b");
        registry.create(&record("a")).expect("a");
        std::fs::create_dir_all(dir.path().join("broken")).unwrap();
        std::fs::write(dir.path().join("broken/config.json"), "{not json").unwrap();

        let names: Vec<_> = registry.list().expect("list").into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn list_of_missing_state_dir_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = Registry::new(dir.path().join("absent"));
        assert!(registry.list().expect("list").is_empty());
    }

    #[test]
    fn update_status_rewrites_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = Registry::new(dir.path());
        registry.create(&record("web")).expect("create");

        let updated = registry.update_status("web", ContainerStatus::Stopped).expect("update");
        assert_eq!(updated.status, ContainerStatus::Stopped);
        assert_eq!(registry.lookup("web").unwrap().status, ContainerStatus::Stopped);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("web"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("config.json")]);
    }

    #[test]
    fn remove_deletes_directory_and_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = Registry::new(dir.path());
        registry.create(&record("web")).expect("create");
        std::fs::write(registry.log_path("web"), "hello\n").unwrap();

        registry.remove("web").expect("remove");
        assert!(!dir.path().join("web").exists());
    }

    #[test]
    fn path_like_names_are_rejected() {
        for name in ["", "..", "a/b"] {
            assert!(validate_name(name).is_err(), "{name:?} accepted");
        }
        assert!(validate_name("web-1").is_ok());
    }
}
