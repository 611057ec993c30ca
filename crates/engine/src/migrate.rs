//! One-time conversion of legacy browser-local snapshots into the shared
//! store. The legacy shape is a JSON object keyed by asset id, camelCase
//! field names, with no pruning guarantees.

use std::collections::BTreeMap;

use serde::Deserialize;

use coedit_core::{AssetEdits, AssetId, QuestionEdit};
use coedit_storage::{EditStore, ImportOutcome, ImportRecord};

use crate::error::SessionError;
use crate::SyncSession;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyAsset {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    purpose: Option<String>,
    #[serde(default)]
    core_question: Option<String>,
    #[serde(default)]
    checklist: Option<BTreeMap<String, String>>,
    #[serde(default)]
    questions: Option<BTreeMap<String, LegacyQuestion>>,
}

#[derive(Debug, Deserialize)]
struct LegacyQuestion {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub records: Vec<ImportRecord>,
    /// Entries that could not be converted, with the reason. A skipped
    /// entry is never fatal to the rest of the snapshot.
    pub skipped: Vec<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn convert_asset(legacy: LegacyAsset) -> AssetEdits {
    let mut edits = AssetEdits {
        title: non_empty(legacy.title),
        purpose: non_empty(legacy.purpose),
        core_question: non_empty(legacy.core_question),
        checklist: legacy.checklist.map(|mut c| {
            c.retain(|_, v| !v.is_empty());
            c
        }),
        questions: legacy.questions.map(|q| {
            q.into_iter()
                .map(|(id, question)| {
                    (
                        id,
                        QuestionEdit {
                            label: non_empty(question.label),
                            description: non_empty(question.description),
                        },
                    )
                })
                .collect()
        }),
    };
    edits.normalize();
    edits
}

/// Parse a legacy snapshot into import records. Malformed per-asset
/// entries are skipped and reported; an unreadable top level is an error.
pub fn convert_legacy_snapshot(raw: &str) -> Result<MigrationReport, SessionError> {
    let parsed: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(raw).map_err(|e| SessionError::LegacySnapshot(e.to_string()))?;

    let mut report = MigrationReport::default();
    for (key, value) in parsed {
        let Ok(asset_id) = key.parse::<AssetId>() else {
            report.skipped.push(format!("{key}: not an asset id"));
            continue;
        };
        match serde_json::from_value::<LegacyAsset>(value) {
            Ok(legacy) => {
                let modifications = convert_asset(legacy);
                if modifications.is_empty() {
                    report.skipped.push(format!("{key}: nothing to migrate"));
                    continue;
                }
                report.records.push(ImportRecord {
                    asset_id,
                    modifications,
                });
            }
            Err(e) => report.skipped.push(format!("{key}: {e}")),
        }
    }
    Ok(report)
}

/// Convert and import a legacy snapshot through a session. Skipped
/// entries are folded into the outcome's error list.
pub fn import_legacy_snapshot<S: EditStore>(
    session: &mut SyncSession<S>,
    raw: &str,
) -> Result<ImportOutcome, SessionError> {
    let report = convert_legacy_snapshot(raw)?;
    let mut outcome = session.import_edits(&report.records)?;
    outcome.errors.extend(report.skipped);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coedit_core::{FieldRef, QuestionPart};

    #[test]
    fn converts_camel_case_snapshot() {
        let raw = r#"{
            "7": {
                "title": "Renamed",
                "coreQuestion": "Why?",
                "checklist": {"c1": "done", "c2": ""},
                "questions": {"q1": {"label": "L", "description": ""}}
            }
        }"#;
        let report = convert_legacy_snapshot(raw).unwrap();
        assert!(report.skipped.is_empty());
        assert_eq!(report.records.len(), 1);

        let record = &report.records[0];
        assert_eq!(record.asset_id, AssetId::new(7));
        let m = &record.modifications;
        assert_eq!(m.title.as_deref(), Some("Renamed"));
        assert_eq!(m.core_question.as_deref(), Some("Why?"));
        // Empty legacy values are pruned, not imported as "".
        assert_eq!(
            m.value(&FieldRef::checklist(AssetId::new(7), "c2")),
            None
        );
        assert_eq!(
            m.value(&FieldRef::question(AssetId::new(7), "q1", QuestionPart::Description)),
            None
        );
        assert_eq!(
            m.value(&FieldRef::question(AssetId::new(7), "q1", QuestionPart::Label)),
            Some("L")
        );
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let raw = r#"{
            "3": {"title": "Kept"},
            "not-an-id": {"title": "Dropped"},
            "5": {"checklist": "wrong shape"},
            "6": {"title": ""}
        }"#;
        let report = convert_legacy_snapshot(raw).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].asset_id, AssetId::new(3));
        assert_eq!(report.skipped.len(), 3);
    }

    #[test]
    fn unreadable_snapshot_is_an_error() {
        assert!(matches!(
            convert_legacy_snapshot("not json"),
            Err(SessionError::LegacySnapshot(_))
        ));
    }
}
