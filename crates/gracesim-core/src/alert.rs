//! Append-only alert broadcast over a shared file.
//!
//! This emulates the pub/sub side channel without a real transport:
//! the writer appends one `"<channel>|<json>"` line per audit message,
//! and the monitor tails the file, detecting growth by comparing
//! modification times and handing newly appended `(channel, message)`
//! pairs to a callback in arrival order.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::warn;

use crate::audit::AlertMessage;
use crate::error::{Error, Result};

/// Separator between the channel name and the serialized message.
const CHANNEL_SEP: char = '|';

/// Formats one alert line.
fn alert_to_line(channel: &str, message: &AlertMessage) -> Result<String> {
    let json = serde_json::to_string(message)?;
    Ok(format!("{channel}{CHANNEL_SEP}{json}"))
}

/// Parses one alert line back into its channel and message.
fn line_to_alert(line: &str) -> Result<(String, AlertMessage)> {
    let (channel, json) = line.split_once(CHANNEL_SEP).ok_or_else(|| {
        Error::Serialization(<serde_json::Error as serde::de::Error>::custom(format!(
            "alert line missing '{CHANNEL_SEP}' separator: {line}"
        )))
    })?;
    let message = serde_json::from_str(json)?;
    Ok((channel.to_string(), message))
}

/// Appends audit messages to the shared alert file.
#[derive(Debug)]
pub struct AlertWriter {
    path: PathBuf,
}

impl AlertWriter {
    /// Opens the writer, creating the alert file if absent.
    ///
    /// # Errors
    ///
    /// Returns an io error if the file cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::io(format!("opening alert file {}", path.display()), e))?;
        Ok(Self { path })
    }

    /// Returns the alert file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one message line tagged with `channel`.
    ///
    /// # Errors
    ///
    /// Returns an io error if the append fails.
    pub fn send(&self, channel: &str, message: &AlertMessage) -> Result<()> {
        let line = alert_to_line(channel, message)?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::io(format!("opening alert file {}", self.path.display()), e))?;
        writeln!(file, "{line}")
            .map_err(|e| Error::io(format!("appending to {}", self.path.display()), e))
    }
}

/// Tails an alert file, surfacing newly appended messages.
///
/// The monitor starts at the end of the file: only messages appended
/// after construction are reported.
pub struct AlertMonitor {
    path: PathBuf,
    offset: u64,
    mtime: Option<SystemTime>,
}

impl AlertMonitor {
    /// Attaches to an existing alert file.
    ///
    /// # Errors
    ///
    /// Fails if the file does not exist.
    pub fn attach(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let meta = std::fs::metadata(&path)
            .map_err(|e| Error::io(format!("alert file {} not found", path.display()), e))?;
        Ok(Self {
            offset: meta.len(),
            mtime: meta.modified().ok(),
            path,
        })
    }

    /// Attaches to an alert file and replays it from the beginning.
    ///
    /// # Errors
    ///
    /// Fails if the file does not exist.
    pub fn attach_from_start(path: impl Into<PathBuf>) -> Result<Self> {
        let mut monitor = Self::attach(path)?;
        monitor.offset = 0;
        monitor.mtime = None;
        Ok(monitor)
    }

    /// Returns true if the file changed since the last poll.
    ///
    /// Checks length as well as modification time; appends within one
    /// timestamp granule are still detected.
    fn was_touched(&self) -> bool {
        let Ok(meta) = std::fs::metadata(&self.path) else {
            return false;
        };
        meta.len() != self.offset || meta.modified().ok() != self.mtime
    }

    /// Returns the messages appended since the last poll, in order.
    ///
    /// # Errors
    ///
    /// Returns an io error if the file cannot be read; malformed lines
    /// are skipped with a warning rather than aborting the tail.
    pub fn poll(&mut self) -> Result<Vec<(String, AlertMessage)>> {
        if !self.was_touched() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .map_err(|e| Error::io(format!("opening {}", self.path.display()), e))?;
        self.mtime = file.metadata().and_then(|m| m.modified()).ok().or(self.mtime);

        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(self.offset))
            .map_err(|e| Error::io(format!("seeking {}", self.path.display()), e))?;

        let mut alerts = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| Error::io(format!("reading {}", self.path.display()), e))?;
            if read == 0 {
                break;
            }
            // Only consume complete lines; a partial trailing line is
            // re-read on the next poll.
            if !line.ends_with('\n') {
                break;
            }
            self.offset += read as u64;
            match line_to_alert(line.trim_end()) {
                Ok(alert) => alerts.push(alert),
                Err(err) => warn!(%err, "skipping malformed alert line"),
            }
        }
        Ok(alerts)
    }

    /// Polls forever at `cadence`, invoking `handler` for each message
    /// in arrival order. Returns only on error or when `handler`
    /// returns `false`.
    ///
    /// # Errors
    ///
    /// Propagates the first poll failure.
    pub fn monitor<F>(&mut self, cadence: Duration, mut handler: F) -> Result<()>
    where
        F: FnMut(&str, &AlertMessage) -> bool,
    {
        loop {
            for (channel, message) in self.poll()? {
                if !handler(&channel, &message) {
                    return Ok(());
                }
            }
            std::thread::sleep(cadence);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AlertType;
    use tempfile::TempDir;

    fn message(n: usize) -> AlertMessage {
        AlertMessage {
            uid: "T000000".parse().unwrap(),
            alert_type: AlertType::Update,
            description: format!("entry {n}"),
            file: None,
            object: serde_json::json!({ "n": n }),
        }
    }

    #[test]
    fn line_round_trip() {
        let line = alert_to_line("Test_gstlal_LowMass", &message(3)).unwrap();
        let (channel, back) = line_to_alert(&line).unwrap();
        assert_eq!(channel, "Test_gstlal_LowMass");
        assert_eq!(back.description, "entry 3");
    }

    #[test]
    fn monitor_sees_messages_in_arrival_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("alert.out");
        let writer = AlertWriter::open(&path).unwrap();
        let mut monitor = AlertMonitor::attach(&path).unwrap();

        for n in 0..5 {
            writer.send("Test_gstlal", &message(n)).unwrap();
        }
        let seen = monitor.poll().unwrap();
        assert_eq!(seen.len(), 5);
        for (n, (channel, msg)) in seen.iter().enumerate() {
            assert_eq!(channel, "Test_gstlal");
            assert_eq!(msg.description, format!("entry {n}"));
        }
        // Nothing new: next poll is empty.
        assert!(monitor.poll().unwrap().is_empty());
    }

    #[test]
    fn monitor_starts_at_end_of_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("alert.out");
        let writer = AlertWriter::open(&path).unwrap();
        writer.send("old", &message(0)).unwrap();

        let mut monitor = AlertMonitor::attach(&path).unwrap();
        writer.send("new", &message(1)).unwrap();
        let seen = monitor.poll().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "new");
    }

    #[test]
    fn attach_from_start_replays_everything() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("alert.out");
        let writer = AlertWriter::open(&path).unwrap();
        writer.send("a", &message(0)).unwrap();
        writer.send("b", &message(1)).unwrap();

        let mut monitor = AlertMonitor::attach_from_start(&path).unwrap();
        let seen = monitor.poll().unwrap();
        assert_eq!(seen.len(), 2);
    }
}
