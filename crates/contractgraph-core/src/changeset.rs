// ABOUTME: Normalizes raw per-file diff records from the version-control layer into a ChangeSet
// ABOUTME: Validates content invariants per change kind and deduplicates records by path

use crate::{ChangeKind, ContractGraphError, Result, Snapshot, Warning, WarningCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// A file-level diff record as supplied by the external query layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFileChange {
    pub path: String,
    pub change_kind: ChangeKind,
    #[serde(default)]
    pub old_path: Option<String>,
    #[serde(default)]
    pub before_content: Option<String>,
    #[serde(default)]
    pub after_content: Option<String>,
}

impl RawFileChange {
    pub fn added(path: &str, content: &str) -> Self {
        Self {
            path: path.to_string(),
            change_kind: ChangeKind::Added,
            old_path: None,
            before_content: None,
            after_content: Some(content.to_string()),
        }
    }

    pub fn removed(path: &str, content: &str) -> Self {
        Self {
            path: path.to_string(),
            change_kind: ChangeKind::Removed,
            old_path: None,
            before_content: Some(content.to_string()),
            after_content: None,
        }
    }

    pub fn modified(path: &str, before: &str, after: &str) -> Self {
        Self {
            path: path.to_string(),
            change_kind: ChangeKind::Modified,
            old_path: None,
            before_content: Some(before.to_string()),
            after_content: Some(after.to_string()),
        }
    }

    pub fn renamed(old_path: &str, new_path: &str, before: &str, after: &str) -> Self {
        Self {
            path: new_path.to_string(),
            change_kind: ChangeKind::Renamed,
            old_path: Some(old_path.to_string()),
            before_content: Some(before.to_string()),
            after_content: Some(after.to_string()),
        }
    }
}

/// An unchanged file whose content is identical in both snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFile {
    pub path: String,
    pub content: String,
}

impl ContextFile {
    pub fn new(path: &str, content: &str) -> Self {
        Self {
            path: path.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub change_kind: ChangeKind,
    pub old_path: Option<String>,
    pub before_content: Option<String>,
    pub after_content: Option<String>,
}

impl FileChange {
    /// Path of the file in the given snapshot, if it exists there.
    pub fn path_in(&self, snapshot: Snapshot) -> Option<&str> {
        match (snapshot, self.change_kind) {
            (Snapshot::Before, ChangeKind::Added) => None,
            (Snapshot::After, ChangeKind::Removed) => None,
            (Snapshot::Before, ChangeKind::Renamed) => self.old_path.as_deref(),
            _ => Some(self.path.as_str()),
        }
    }

    pub fn content_in(&self, snapshot: Snapshot) -> Option<&str> {
        match snapshot {
            Snapshot::Before => self.before_content.as_deref(),
            Snapshot::After => self.after_content.as_deref(),
        }
    }
}

/// One file of a snapshot, ready for contract extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotFile<'a> {
    pub path: &'a str,
    pub content: &'a str,
    /// `None` for context files.
    pub change_kind: Option<ChangeKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub renamed: usize,
    pub files_changed: usize,
    pub context_files: usize,
}

/// Validated, path-ordered set of file changes. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    changes: Vec<FileChange>,
    context: Vec<ContextFile>,
}

impl ChangeSet {
    pub fn changes(&self) -> &[FileChange] {
        &self.changes
    }

    pub fn context(&self) -> &[ContextFile] {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&FileChange> {
        self.changes.iter().find(|c| c.path == path)
    }

    /// All files present in `snapshot`, sorted by path.
    pub fn snapshot_files(&self, snapshot: Snapshot) -> Vec<SnapshotFile<'_>> {
        let mut files: Vec<SnapshotFile<'_>> = self
            .changes
            .iter()
            .filter_map(|change| {
                let path = change.path_in(snapshot)?;
                let content = change.content_in(snapshot)?;
                Some(SnapshotFile {
                    path,
                    content,
                    change_kind: Some(change.change_kind),
                })
            })
            .chain(self.context.iter().map(|ctx| SnapshotFile {
                path: ctx.path.as_str(),
                content: ctx.content.as_str(),
                change_kind: None,
            }))
            .collect();
        files.sort_by(|a, b| a.path.cmp(b.path));
        files
    }

    pub fn summary(&self) -> ChangeSummary {
        let mut summary = ChangeSummary {
            files_changed: self.changes.len(),
            context_files: self.context.len(),
            ..ChangeSummary::default()
        };
        for change in &self.changes {
            match change.change_kind {
                ChangeKind::Added => summary.added += 1,
                ChangeKind::Removed => summary.removed += 1,
                ChangeKind::Modified => summary.modified += 1,
                ChangeKind::Renamed => summary.renamed += 1,
            }
        }
        summary
    }
}

/// Normalizes separators, strips `./` prefixes and collapses repeated slashes.
pub fn normalize_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        segments.push(segment);
    }
    let joined = segments.join("/");
    if unified.starts_with('/') {
        format!("/{}", joined)
    } else {
        joined
    }
}

pub struct ChangeIngestor;

impl ChangeIngestor {
    /// Validates raw records into a `ChangeSet`. Fails before any graph work on
    /// empty input, malformed records or content missing for a declared path.
    pub fn ingest(
        records: Vec<RawFileChange>,
        context: Vec<ContextFile>,
    ) -> Result<(ChangeSet, Vec<Warning>)> {
        if records.is_empty() {
            return Err(ContractGraphError::NoChangesFound);
        }

        let mut warnings = Vec::new();
        let mut by_path: BTreeMap<String, FileChange> = BTreeMap::new();

        for record in records {
            let path = normalize_path(&record.path);
            if path.is_empty() {
                return Err(ContractGraphError::ingest(
                    record.path,
                    "record has an empty path",
                ));
            }
            let change = FileChange {
                old_path: record.old_path.as_deref().map(normalize_path),
                path: path.clone(),
                change_kind: record.change_kind,
                before_content: record.before_content,
                after_content: record.after_content,
            };
            if let Some(previous) = by_path.insert(path.clone(), change) {
                let current = by_path
                    .get(&path)
                    .map(|c| c.change_kind)
                    .unwrap_or(previous.change_kind);
                if previous.change_kind != current {
                    warnings.push(Warning::new(
                        WarningCode::ConflictingChangeKind,
                        Some(&path),
                        format!(
                            "duplicate records disagree ({} then {}); keeping the last",
                            previous.change_kind, current
                        ),
                    ));
                } else {
                    debug!(path = %path, "duplicate change record replaced");
                }
            }
        }

        for change in by_path.values() {
            Self::validate(change)?;
        }
        Self::check_snapshot_paths(&by_path)?;

        let mut context_by_path: BTreeMap<String, ContextFile> = BTreeMap::new();
        for file in context {
            let path = normalize_path(&file.path);
            if path.is_empty() {
                return Err(ContractGraphError::ingest(
                    file.path,
                    "context file has an empty path",
                ));
            }
            let shadowed = by_path.values().any(|c| {
                c.path == path || c.old_path.as_deref() == Some(path.as_str())
            });
            if shadowed {
                warnings.push(Warning::new(
                    WarningCode::ContextCollision,
                    Some(&path),
                    "context file collides with a changed path and was dropped",
                ));
                continue;
            }
            context_by_path.insert(
                path.clone(),
                ContextFile {
                    path,
                    content: file.content,
                },
            );
        }

        let change_set = ChangeSet {
            changes: by_path.into_values().collect(),
            context: context_by_path.into_values().collect(),
        };
        let summary = change_set.summary();
        info!(
            added = summary.added,
            removed = summary.removed,
            modified = summary.modified,
            renamed = summary.renamed,
            context = summary.context_files,
            "Ingested change set"
        );
        Ok((change_set, warnings))
    }

    fn validate(change: &FileChange) -> Result<()> {
        let path = change.path.as_str();
        let has_before = change.before_content.is_some();
        let has_after = change.after_content.is_some();
        match change.change_kind {
            ChangeKind::Added => {
                if has_before {
                    return Err(ContractGraphError::ingest(
                        path,
                        "added file must not carry before content",
                    ));
                }
                if !has_after {
                    return Err(ContractGraphError::ingest(path, "added file has no content"));
                }
            }
            ChangeKind::Removed => {
                if has_after {
                    return Err(ContractGraphError::ingest(
                        path,
                        "removed file must not carry after content",
                    ));
                }
                if !has_before {
                    return Err(ContractGraphError::ingest(
                        path,
                        "removed file has no before content",
                    ));
                }
            }
            ChangeKind::Modified => {
                if !has_before || !has_after {
                    return Err(ContractGraphError::ingest(
                        path,
                        "modified file needs both before and after content",
                    ));
                }
            }
            ChangeKind::Renamed => {
                match change.old_path.as_deref() {
                    Some(old) if !old.is_empty() => {}
                    _ => {
                        return Err(ContractGraphError::ingest(
                            path,
                            "renamed file carries no old path",
                        ))
                    }
                }
                if !has_before || !has_after {
                    return Err(ContractGraphError::ingest(
                        path,
                        "renamed file needs both before and after content",
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_snapshot_paths(changes: &BTreeMap<String, FileChange>) -> Result<()> {
        for snapshot in [Snapshot::Before, Snapshot::After] {
            let mut seen = BTreeSet::new();
            for change in changes.values() {
                if let Some(path) = change.path_in(snapshot) {
                    if !seen.insert(path) {
                        return Err(ContractGraphError::ingest(
                            path,
                            format!("path appears twice in the {} snapshot", snapshot),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
