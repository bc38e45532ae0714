//! Machine-readable conflict report.

use crate::error::SyncResult;
use crate::mapping::ScopeId;
use crate::plan::TaskPair;
use crate::redact::Redactor;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;
use tasksync_model::{conflict_field_diffs, CommonTask, ConflictFieldDiff};

/// Labels of the scope a conflict belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeLabels {
    /// Left list id.
    pub left_list: String,
    /// Right project id.
    pub right_project: String,
}

/// One conflicting pair in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReportEntry {
    /// Scope of the pair.
    pub scope_labels: ScopeLabels,
    /// Left task.
    pub left_snapshot: CommonTask,
    /// Right task.
    pub right_snapshot: CommonTask,
    /// Differing fields.
    pub diffs: Vec<ConflictFieldDiff>,
}

/// Unresolved conflicts of one or more scopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    /// Generation time, RFC 3339.
    pub generated_at: String,
    /// Number of entries.
    pub conflict_count: usize,
    /// Entries.
    pub conflicts: Vec<ConflictReportEntry>,
}

impl ConflictReport {
    /// Creates an empty report.
    pub fn new(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            conflict_count: 0,
            conflicts: Vec::new(),
        }
    }

    /// Adds the pairs of one scope.
    pub fn extend(&mut self, scope: &ScopeId, pairs: &[TaskPair]) {
        for pair in pairs {
            self.conflicts.push(ConflictReportEntry {
                scope_labels: ScopeLabels {
                    left_list: scope.left_list_id.clone(),
                    right_project: scope.right_project_id.clone(),
                },
                left_snapshot: pair.left.clone(),
                right_snapshot: pair.right.clone(),
                diffs: conflict_field_diffs(&pair.left, &pair.right),
            });
        }
        self.conflict_count = self.conflicts.len();
    }

    /// Returns true if the report lists nothing.
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Renders the report as pretty JSON with secrets redacted.
    pub fn to_json(&self, redactor: &Redactor) -> SyncResult<String> {
        let json = serde_json::to_string_pretty(self)?;
        Ok(redactor.redact(&json))
    }

    /// Writes the redacted report to `path`.
    pub fn write_to(&self, path: &Path, redactor: &Redactor) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json(redactor)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_model::Side;

    fn report() -> ConflictReport {
        let generated: DateTime<Utc> = "2026-01-20T09:00:00Z".parse().unwrap();
        let mut report = ConflictReport::new(generated);
        let pair = TaskPair::new(
            CommonTask::new(Side::Left, "l1", "inbox", "Buy milk")
                .with_notes("Authorization: Bearer abc.def"),
            CommonTask::new(Side::Right, "r1", "7", "Buy oat milk"),
        );
        report.extend(&ScopeId::new("inbox", "7"), &[pair]);
        report
    }

    #[test]
    fn report_shape() {
        let json = report().to_json(&Redactor::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["generatedAt"], "2026-01-20T09:00:00Z");
        assert_eq!(value["conflictCount"], 1);
        assert_eq!(value["conflicts"][0]["scopeLabels"]["leftList"], "inbox");
        assert_eq!(value["conflicts"][0]["diffs"][0]["field"], "title");
        assert!(value["conflicts"][0]["leftSnapshot"].is_object());
    }

    #[test]
    fn report_is_redacted() {
        let json = report().to_json(&Redactor::default()).unwrap();
        assert!(!json.contains("abc.def"));
        assert!(json.contains("Bearer [redacted]"));
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("conflicts.json");
        report().write_to(&path, &Redactor::default()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"conflictCount\": 1"));
    }
}
