//! JSON output for finished source runs.
//!
//! A report is handed over only after its run completed, and each
//! destination is written through a temp file and renamed into place, so a
//! failing source or an interrupted write never touches files already
//! written by other sources.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::resolve::{SourceReport, UnresolvedReason};
use crate::source::Channel;

/// Errors writing output files.
#[derive(Debug, Error)]
pub enum WriteError {
    /// I/O error creating, writing or renaming the file.
    #[error("I/O error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// JSON serialization error.
    #[error("cannot serialize {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl WriteError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Path that failed.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Serialize { path, .. } => path,
        }
    }
}

/// Sink for a `version -> url` mapping.
pub trait ResultWriter {
    /// Writes `mapping` to `destination` (a file name) and returns where it went.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] when the destination cannot be written.
    fn write(
        &self,
        mapping: &IndexMap<&str, &str>,
        destination: &str,
    ) -> Result<PathBuf, WriteError>;

    /// Writes the unresolved report for a source.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] when the destination cannot be written.
    fn write_unresolved(
        &self,
        entries: &IndexMap<&str, UnresolvedRecord<'_>>,
        destination: &str,
    ) -> Result<PathBuf, WriteError>;
}

/// One line of `unresolved_<source>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedRecord<'a> {
    pub channel: Channel,
    pub reason: UnresolvedReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<&'a str>,
}

/// Writes pretty JSON (4-space indent) into one directory.
#[derive(Debug, Clone)]
pub struct JsonFileWriter {
    output_dir: PathBuf,
}

impl JsonFileWriter {
    /// Creates a writer targeting `output_dir`; the directory is created on first write.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[instrument(skip(self, value), fields(dir = %self.output_dir.display()))]
    fn write_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
        destination: &str,
    ) -> Result<PathBuf, WriteError> {
        fs::create_dir_all(&self.output_dir).map_err(|e| WriteError::io(&self.output_dir, e))?;

        let path = self.output_dir.join(destination);
        let tmp_path = self.output_dir.join(format!(".{destination}.tmp"));

        let result = write_pretty(value, &tmp_path).and_then(|()| {
            fs::rename(&tmp_path, &path).map_err(|e| WriteError::io(&path, e))
        });
        if let Err(err) = result {
            // Leave no half-written temp file behind.
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }

        debug!(path = %path.display(), "output written");
        Ok(path)
    }
}

fn write_pretty<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), WriteError> {
    let file = fs::File::create(path).map_err(|e| WriteError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    value
        .serialize(&mut serializer)
        .map_err(|source| WriteError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
    writer.flush().map_err(|e| WriteError::io(path, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| WriteError::io(path, e))
}

impl ResultWriter for JsonFileWriter {
    fn write(
        &self,
        mapping: &IndexMap<&str, &str>,
        destination: &str,
    ) -> Result<PathBuf, WriteError> {
        self.write_json(mapping, destination)
    }

    fn write_unresolved(
        &self,
        entries: &IndexMap<&str, UnresolvedRecord<'_>>,
        destination: &str,
    ) -> Result<PathBuf, WriteError> {
        self.write_json(entries, destination)
    }
}

/// Output file name for one channel of a source.
///
/// Partitioned sources get `release_`/`snapshot_` prefixed files; others
/// get a single `<source>_downloads.json`.
#[must_use]
pub fn destination_for(source: &str, channel: Option<Channel>) -> String {
    match channel {
        Some(Channel::Stable) => format!("release_{source}_downloads.json"),
        Some(Channel::Unstable) => format!("snapshot_{source}_downloads.json"),
        None => format!("{source}_downloads.json"),
    }
}

/// File name of a source's unresolved report.
#[must_use]
pub fn unresolved_destination(source: &str) -> String {
    format!("unresolved_{source}.json")
}

/// Writes every destination for a finished report.
///
/// # Errors
///
/// Returns the first [`WriteError`]; destinations written before it stay in place.
#[instrument(skip(writer, report), fields(source = %report.source))]
pub fn write_report(
    writer: &dyn ResultWriter,
    report: &SourceReport,
    include_unresolved: bool,
) -> Result<Vec<PathBuf>, WriteError> {
    let mut written = Vec::new();

    if report.partitioned {
        for channel in [Channel::Stable, Channel::Unstable] {
            let urls = report.mapping.urls(channel);
            written.push(writer.write(&urls, &destination_for(&report.source, Some(channel)))?);
        }
    } else {
        let urls = report.mapping.all_urls();
        written.push(writer.write(&urls, &destination_for(&report.source, None))?);
    }

    if include_unresolved {
        let records: IndexMap<&str, UnresolvedRecord<'_>> = report
            .unresolved
            .iter()
            .map(|u| {
                (
                    u.version.as_str(),
                    UnresolvedRecord {
                        channel: u.channel,
                        reason: u.reason,
                        detail: u.detail.as_deref(),
                    },
                )
            })
            .collect();
        written.push(writer.write_unresolved(&records, &unresolved_destination(&report.source))?);
    }

    info!(files = written.len(), "source output written");
    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resolve::{ResolvedEntry, UnresolvedEntry};

    fn report(partitioned: bool) -> SourceReport {
        let mut report = SourceReport::new("vanilla", partitioned);
        report.mapping.insert(ResolvedEntry {
            version: "1.20.4".to_string(),
            channel: Channel::Stable,
            url: "https://cdn.example.com/1.20.4/server.jar".to_string(),
            build_number: None,
        });
        report.mapping.insert(ResolvedEntry {
            version: "24w03a".to_string(),
            channel: Channel::Unstable,
            url: "https://cdn.example.com/24w03a/server.jar".to_string(),
            build_number: None,
        });
        report.unresolved.push(UnresolvedEntry {
            version: "rd-132211".to_string(),
            channel: Channel::Stable,
            reason: UnresolvedReason::NoArtifactMatch,
            detail: Some("selected build has no location".to_string()),
        });
        report
    }

    #[test]
    fn test_destination_names() {
        assert_eq!(
            destination_for("fabric", Some(Channel::Stable)),
            "release_fabric_downloads.json"
        );
        assert_eq!(
            destination_for("fabric", Some(Channel::Unstable)),
            "snapshot_fabric_downloads.json"
        );
        assert_eq!(destination_for("paper", None), "paper_downloads.json");
        assert_eq!(unresolved_destination("paper"), "unresolved_paper.json");
    }

    #[test]
    fn test_write_uses_four_space_indent_and_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonFileWriter::new(dir.path());
        let mut mapping = IndexMap::new();
        mapping.insert("1.9", "https://example.com/b");
        mapping.insert("1.10", "https://example.com/a");

        let path = writer.write(&mapping, "paper_downloads.json").unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            "{\n    \"1.9\": \"https://example.com/b\",\n    \"1.10\": \"https://example.com/a\"\n}"
        );
    }

    #[test]
    fn test_partitioned_report_writes_release_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonFileWriter::new(dir.path().join("nested"));
        let paths = write_report(&writer, &report(true), true).unwrap();

        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "release_vanilla_downloads.json",
                "snapshot_vanilla_downloads.json",
                "unresolved_vanilla.json"
            ]
        );

        let release: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths[0]).unwrap()).unwrap();
        assert_eq!(release["1.20.4"], "https://cdn.example.com/1.20.4/server.jar");
        assert!(release.get("24w03a").is_none());

        let unresolved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths[2]).unwrap()).unwrap();
        assert_eq!(unresolved["rd-132211"]["reason"], "no_artifact_match");
        assert_eq!(unresolved["rd-132211"]["channel"], "stable");
    }

    #[test]
    fn test_single_channel_report_merges_channels() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonFileWriter::new(dir.path());
        let paths = write_report(&writer, &report(false), false).unwrap();
        assert_eq!(paths.len(), 1);
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths[0]).unwrap()).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_rewrite_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonFileWriter::new(dir.path());
        let first = write_report(&writer, &report(true), true).unwrap();
        let before: Vec<Vec<u8>> = first.iter().map(|p| fs::read(p).unwrap()).collect();
        let second = write_report(&writer, &report(true), true).unwrap();
        let after: Vec<Vec<u8>> = second.iter().map(|p| fs::read(p).unwrap()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_write_into_file_path_fails_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let writer = JsonFileWriter::new(&blocker);
        let err = writer.write(&IndexMap::new(), "x.json").unwrap_err();
        assert!(matches!(err, WriteError::Io { .. }));
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "not a directory");
    }
}
