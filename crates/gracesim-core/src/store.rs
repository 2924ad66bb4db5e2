//! The fake event-candidate database.
//!
//! [`FakeDb`] emulates the subset of the real service's write/query API
//! that client tooling and follow-up pipelines exercise, backed by the
//! local filesystem. Each event owns one directory:
//!
//! ```text
//! <root>/
//! └── {graceid}/
//!     ├── toplevel.json     # creation metadata
//!     ├── logs.json         # ordered annotation log
//!     ├── labels.json       # applied labels
//!     ├── files.json        # uploaded file registry
//!     └── {basename}        # copies of uploaded files
//! ```
//!
//! Every mutating call appends exactly one audit line per logical
//! mutation to the shared alert file, tagged with the event's
//! classification channel, in the same order the mutations applied.
//!
//! Records are append-only: log entries are never rewritten, labels
//! and files are never removed within a simulation run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::alert::AlertWriter;
use crate::audit::AlertMessage;
use crate::error::{Error, Result};
use crate::id::{Classification, GraceId, Group};
use crate::initial_data;
use crate::label::Label;
use crate::query::Query;

const TOPLEVEL_FILE: &str = "toplevel.json";
const LOGS_FILE: &str = "logs.json";
const LABELS_FILE: &str = "labels.json";
const FILES_FILE: &str = "files.json";

/// Top-level creation metadata for one event record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// The assigned identifier.
    pub graceid: GraceId,
    /// Classification triple the event was created with.
    #[serde(flatten)]
    pub classification: Classification,
    /// GPS time extracted from the initial data, when parseable.
    pub gpstime: Option<f64>,
    /// False-alarm rate extracted from the initial data, when parseable.
    pub far: Option<f64>,
    /// Free-form attributes extracted from the pipeline payload.
    pub extra: serde_json::Map<String, serde_json::Value>,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
}

/// One annotation in an event's ordered log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Sequence number; dense and strictly increasing per event.
    pub n: usize,
    /// Message text.
    pub comment: String,
    /// Basename of the attached file, if any.
    pub filename: Option<String>,
    /// Tags applied to this entry.
    pub tag_names: Vec<String>,
    /// Who wrote the entry.
    pub issuer: String,
    /// When the entry was written.
    pub created: DateTime<Utc>,
}

/// One applied label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEntry {
    /// The label name.
    pub name: Label,
    /// Who applied it.
    pub creator: String,
    /// Sequence number of the log entry the application wrote.
    pub log_index: usize,
    /// When the label was applied.
    pub created: DateTime<Utc>,
}

/// One uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Basename the file is registered under.
    pub basename: String,
    /// Path of the stored copy inside the event directory.
    pub path: PathBuf,
    /// Sequence number of the log entry that attached it, if any.
    pub log_index: Option<usize>,
}

/// Response from a log listing: the entries plus a row count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPage {
    /// Number of entries.
    #[serde(rename = "numRows")]
    pub num_rows: usize,
    /// The entries, in sequence order.
    pub log: Vec<LogEntry>,
}

/// The write/query surface the scheduling engine executes against.
///
/// [`FakeDb`] implements this for local simulation; a thin client for
/// the real service can implement it too and slot into the same
/// driver.
pub trait EventDb {
    /// Creates an event record from an initial-data file.
    fn create_event(&self, classification: Classification, initial_file: &Path)
        -> Result<EventRecord>;

    /// Appends a log entry, optionally attaching one file.
    fn write_log(
        &self,
        graceid: GraceId,
        message: &str,
        filename: Option<&Path>,
        tag_names: &[String],
    ) -> Result<LogEntry>;

    /// Uploads a file; sugar for an empty-message log entry.
    fn write_file(&self, graceid: GraceId, filename: &Path) -> Result<LogEntry> {
        self.write_log(graceid, "", Some(filename), &[])
    }

    /// Applies a label, also writing the coupled log entry.
    fn write_label(&self, graceid: GraceId, label: &Label) -> Result<LabelEntry>;

    /// Always fails; the real service does not support label removal.
    fn remove_label(&self, graceid: GraceId, label: &Label) -> Result<()>;
}

/// A fake GraceDB backed by the local filesystem.
///
/// All mutators take `&self`; a single mutex serializes the
/// read-length-then-append section so log sequence numbers stay dense
/// even if callers share the store across threads.
pub struct FakeDb {
    root: PathBuf,
    issuer: String,
    alerts: AlertWriter,
    write_lock: Mutex<()>,
}

impl FakeDb {
    /// Name of the shared alert file inside the store root.
    pub const ALERT_FILE: &'static str = "alert.out";

    /// Opens (or initializes) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an io error if the root or the alert file cannot be
    /// created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| Error::io(format!("creating store root {}", root.display()), e))?;
        let alerts = AlertWriter::open(root.join(Self::ALERT_FILE))?;
        Ok(Self {
            root,
            issuer: "gracedb-sim".to_string(),
            alerts,
            write_lock: Mutex::new(()),
        })
    }

    /// Overrides the issuer recorded on log entries and labels.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Returns the store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path to the shared alert file.
    #[must_use]
    pub fn alert_path(&self) -> PathBuf {
        self.root.join(Self::ALERT_FILE)
    }

    fn event_dir(&self, graceid: GraceId) -> PathBuf {
        self.root.join(graceid.to_string())
    }

    fn record_path(&self, graceid: GraceId, file: &str) -> PathBuf {
        self.event_dir(graceid).join(file)
    }

    fn exists(&self, graceid: GraceId) -> bool {
        self.record_path(graceid, TOPLEVEL_FILE).is_file()
    }

    fn require(&self, graceid: GraceId) -> Result<()> {
        if self.exists(graceid) {
            Ok(())
        } else {
            Err(Error::UnknownEvent(graceid.to_string()))
        }
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let bytes = fs::read(path)
            .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        fs::write(path, bytes)
            .map_err(|e| Error::io(format!("writing {}", path.display()), e))
    }

    /// Scans existing record directories and returns the next unused
    /// numeric suffix for the group's prefix letter (max + 1, or 0).
    ///
    /// A failed creation never burns a suffix: allocation happens
    /// against whatever is on disk at call time.
    fn next_id(&self, group: Group) -> Result<GraceId> {
        let prefix = group.prefix();
        let mut max_suffix: Option<u32> = None;
        let entries = fs::read_dir(&self.root)
            .map_err(|e| Error::io(format!("listing {}", self.root.display()), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io("listing store root", e))?;
            let name = entry.file_name();
            let Ok(id) = name.to_string_lossy().parse::<GraceId>() else {
                continue;
            };
            if id.prefix() == prefix {
                max_suffix = Some(max_suffix.map_or(id.suffix(), |m| m.max(id.suffix())));
            }
        }
        let suffix = max_suffix.map_or(0, |m| m + 1);
        Ok(GraceId::new(prefix, suffix))
    }

    /// Creates the record directory and seeds the empty sub-records.
    fn create_record_dir(&self, graceid: GraceId) -> Result<()> {
        let dir = self.event_dir(graceid);
        if dir.exists() {
            return Err(Error::DuplicateIdentifier(graceid.to_string()));
        }
        fs::create_dir_all(&dir)
            .map_err(|e| Error::io(format!("creating {}", dir.display()), e))?;
        self.write_json::<Vec<LogEntry>>(&self.record_path(graceid, LOGS_FILE), &Vec::new())?;
        self.write_json::<Vec<LabelEntry>>(&self.record_path(graceid, LABELS_FILE), &Vec::new())?;
        self.write_json::<Vec<FileEntry>>(&self.record_path(graceid, FILES_FILE), &Vec::new())?;
        Ok(())
    }

    /// Copies an uploaded file into the event directory and registers
    /// its basename.
    fn copy_file(&self, graceid: GraceId, source: &Path, log_index: Option<usize>) -> Result<String> {
        let basename = source
            .file_name()
            .ok_or_else(|| Error::io(
                format!("no basename in {}", source.display()),
                std::io::Error::from(std::io::ErrorKind::InvalidInput),
            ))?
            .to_string_lossy()
            .into_owned();
        let dest = self.event_dir(graceid).join(&basename);
        fs::copy(source, &dest).map_err(|e| {
            Error::io(format!("copying {} to {}", source.display(), dest.display()), e)
        })?;

        let files_path = self.record_path(graceid, FILES_FILE);
        let mut files: Vec<FileEntry> = self.read_json(&files_path)?;
        files.push(FileEntry {
            basename: basename.clone(),
            path: dest,
            log_index,
        });
        self.write_json(&files_path, &files)?;
        Ok(basename)
    }

    /// Appends a log entry under the write lock held by the caller.
    fn append_log(
        &self,
        graceid: GraceId,
        message: &str,
        filename: Option<&Path>,
        tag_names: &[String],
    ) -> Result<LogEntry> {
        let logs_path = self.record_path(graceid, LOGS_FILE);
        let mut logs: Vec<LogEntry> = self.read_json(&logs_path)?;
        let n = logs.len();

        let stored = match filename {
            Some(source) => Some(self.copy_file(graceid, source, Some(n))?),
            None => None,
        };
        let entry = LogEntry {
            n,
            comment: message.to_string(),
            filename: stored,
            tag_names: tag_names.to_vec(),
            issuer: self.issuer.clone(),
            created: Utc::now(),
        };
        logs.push(entry.clone());
        self.write_json(&logs_path, &logs)?;
        Ok(entry)
    }

    fn emit(&self, graceid: GraceId, message: &AlertMessage) -> Result<()> {
        let record: EventRecord = self.read_json(&self.record_path(graceid, TOPLEVEL_FILE))?;
        self.alerts.send(&record.classification.channel(), message)
    }

    // --- queries ---

    /// Returns an event's top-level metadata plus its current labels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEvent`] if no such record exists.
    pub fn event(&self, graceid: GraceId) -> Result<EventView> {
        self.require(graceid)?;
        let record: EventRecord = self.read_json(&self.record_path(graceid, TOPLEVEL_FILE))?;
        let labels: Vec<LabelEntry> = self.read_json(&self.record_path(graceid, LABELS_FILE))?;
        let labels = labels
            .into_iter()
            .map(|l| (l.name.to_string(), l))
            .collect();
        Ok(EventView { record, labels })
    }

    /// Returns the full ordered log plus a row count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEvent`] if no such record exists.
    pub fn logs(&self, graceid: GraceId) -> Result<LogPage> {
        self.require(graceid)?;
        let log: Vec<LogEntry> = self.read_json(&self.record_path(graceid, LOGS_FILE))?;
        Ok(LogPage {
            num_rows: log.len(),
            log,
        })
    }

    /// Returns all applied labels in application order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEvent`] if no such record exists.
    pub fn labels(&self, graceid: GraceId) -> Result<Vec<LabelEntry>> {
        self.require(graceid)?;
        self.read_json(&self.record_path(graceid, LABELS_FILE))
    }

    /// Returns a basename → stored-path map of all uploaded files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEvent`] if no such record exists.
    pub fn files(&self, graceid: GraceId) -> Result<BTreeMap<String, PathBuf>> {
        self.require(graceid)?;
        let files: Vec<FileEntry> = self.read_json(&self.record_path(graceid, FILES_FILE))?;
        Ok(files.into_iter().map(|f| (f.basename, f.path)).collect())
    }

    /// Lists every identifier with a record in this store, sorted.
    ///
    /// # Errors
    ///
    /// Returns an io error if the root cannot be listed.
    pub fn ids(&self) -> Result<Vec<GraceId>> {
        let mut ids = Vec::new();
        let entries = fs::read_dir(&self.root)
            .map_err(|e| Error::io(format!("listing {}", self.root.display()), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io("listing store root", e))?;
            if let Ok(id) = entry.file_name().to_string_lossy().parse::<GraceId>() {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Queries events, returning a lazy sequence of matching records.
    ///
    /// `query` uses the mini-language from [`crate::query`]: space
    /// separated tokens, each a GPS window (`t0..t1`), a known label,
    /// or an identifier; all filters intersect. `None` matches every
    /// event. Re-querying re-evaluates against current store state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] for unrecognized tokens.
    pub fn events(&self, query: Option<&str>) -> Result<EventsIter<'_>> {
        let query = match query {
            Some(text) => text.parse::<Query>()?,
            None => Query::default(),
        };
        let ids = self.ids()?;
        Ok(EventsIter {
            db: self,
            ids: ids.into_iter(),
            query,
        })
    }
}

impl EventDb for FakeDb {
    fn create_event(
        &self,
        classification: Classification,
        initial_file: &Path,
    ) -> Result<EventRecord> {
        classification.validate()?;

        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let graceid = self.next_id(classification.group)?;
        self.create_record_dir(graceid)?;

        let parsed = initial_data::parse(classification.pipeline, initial_file);
        let record = EventRecord {
            graceid,
            classification,
            gpstime: parsed.gpstime,
            far: parsed.far,
            extra: parsed.extra,
            created: Utc::now(),
        };
        self.write_json(&self.record_path(graceid, TOPLEVEL_FILE), &record)?;
        info!(graceid = %graceid, classification = %classification, "created event");

        self.emit(graceid, &AlertMessage::new_event(&record))?;

        // Implicit first log entry referencing the initial data.
        let entry = self.append_log(graceid, "initial data", Some(initial_file), &[])?;
        self.emit(graceid, &AlertMessage::update(graceid, &entry))?;

        Ok(record)
    }

    fn write_log(
        &self,
        graceid: GraceId,
        message: &str,
        filename: Option<&Path>,
        tag_names: &[String],
    ) -> Result<LogEntry> {
        self.require(graceid)?;
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let entry = self.append_log(graceid, message, filename, tag_names)?;
        debug!(graceid = %graceid, n = entry.n, "wrote log entry");
        self.emit(graceid, &AlertMessage::update(graceid, &entry))?;
        Ok(entry)
    }

    fn write_label(&self, graceid: GraceId, label: &Label) -> Result<LabelEntry> {
        self.require(graceid)?;
        let _guard = self.write_lock.lock().expect("store lock poisoned");

        // Every label application is independently auditable in the log.
        let log_entry =
            self.append_log(graceid, &format!("applying label : {label}"), None, &[])?;
        self.emit(graceid, &AlertMessage::update(graceid, &log_entry))?;

        let labels_path = self.record_path(graceid, LABELS_FILE);
        let mut labels: Vec<LabelEntry> = self.read_json(&labels_path)?;
        let entry = LabelEntry {
            name: label.clone(),
            creator: self.issuer.clone(),
            log_index: log_entry.n,
            created: Utc::now(),
        };
        labels.push(entry.clone());
        self.write_json(&labels_path, &labels)?;
        info!(graceid = %graceid, label = %label, "applied label");

        self.emit(graceid, &AlertMessage::label(graceid, &entry))?;
        Ok(entry)
    }

    fn remove_label(&self, _graceid: GraceId, _label: &Label) -> Result<()> {
        // Mirrors the real service, which has no label removal.
        Err(Error::NotSupported("removeLabel"))
    }
}

/// Top-level metadata plus a name → label mapping, as returned by
/// [`FakeDb::event`].
#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    /// The top-level record.
    #[serde(flatten)]
    pub record: EventRecord,
    /// Currently applied labels keyed by name.
    pub labels: BTreeMap<String, LabelEntry>,
}

/// Lazy iterator over query matches; see [`FakeDb::events`].
pub struct EventsIter<'a> {
    db: &'a FakeDb,
    ids: std::vec::IntoIter<GraceId>,
    query: Query,
}

impl Iterator for EventsIter<'_> {
    type Item = Result<EventView>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.ids.next()?;
            let view = match self.db.event(id) {
                Ok(view) => view,
                Err(err) => return Some(Err(err)),
            };
            if self.query.matches(&view) {
                return Some(Ok(view));
            }
        }
    }
}
