use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::field_ref::{FieldRef, QuestionPart};
use crate::ids::AssetId;

/// Per-question override: either half may be set independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl QuestionEdit {
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.description.is_none()
    }

    pub fn part(&self, part: QuestionPart) -> Option<&str> {
        match part {
            QuestionPart::Label => self.label.as_deref(),
            QuestionPart::Description => self.description.as_deref(),
        }
    }

    pub fn set_part(&mut self, part: QuestionPart, value: Option<String>) {
        match part {
            QuestionPart::Label => self.label = value,
            QuestionPart::Description => self.description = value,
        }
    }
}

/// All overrides one writer holds for a single asset.
///
/// Invariant: `checklist`, `questions`, and each `QuestionEdit` inside
/// `questions` are either absent or non-empty. `normalize` restores this
/// after any mutation path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEdits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checklist: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<BTreeMap<String, QuestionEdit>>,
}

impl AssetEdits {
    /// Resolve the value at `field`, if present.
    pub fn value(&self, field: &FieldRef) -> Option<&str> {
        match field {
            FieldRef::Title { .. } => self.title.as_deref(),
            FieldRef::Purpose { .. } => self.purpose.as_deref(),
            FieldRef::CoreQuestion { .. } => self.core_question.as_deref(),
            FieldRef::Checklist { item_id, .. } => self
                .checklist
                .as_ref()
                .and_then(|c| c.get(item_id))
                .map(String::as_str),
            FieldRef::Question { question_id, part, .. } => self
                .questions
                .as_ref()
                .and_then(|q| q.get(question_id))
                .and_then(|e| e.part(*part)),
        }
    }

    /// Write `value` at `field`; an empty value clears the leaf instead.
    /// Ends with `normalize`, so the container invariant holds on return.
    pub fn apply(&mut self, field: &FieldRef, value: &str) {
        if value.is_empty() {
            self.clear(field);
        } else {
            self.set(field, value.to_string());
        }
        self.normalize();
    }

    fn set(&mut self, field: &FieldRef, value: String) {
        match field {
            FieldRef::Title { .. } => self.title = Some(value),
            FieldRef::Purpose { .. } => self.purpose = Some(value),
            FieldRef::CoreQuestion { .. } => self.core_question = Some(value),
            FieldRef::Checklist { item_id, .. } => {
                self.checklist
                    .get_or_insert_with(BTreeMap::new)
                    .insert(item_id.clone(), value);
            }
            FieldRef::Question { question_id, part, .. } => {
                self.questions
                    .get_or_insert_with(BTreeMap::new)
                    .entry(question_id.clone())
                    .or_default()
                    .set_part(*part, Some(value));
            }
        }
    }

    fn clear(&mut self, field: &FieldRef) {
        match field {
            FieldRef::Title { .. } => self.title = None,
            FieldRef::Purpose { .. } => self.purpose = None,
            FieldRef::CoreQuestion { .. } => self.core_question = None,
            FieldRef::Checklist { item_id, .. } => {
                if let Some(checklist) = self.checklist.as_mut() {
                    checklist.remove(item_id);
                }
            }
            FieldRef::Question { question_id, part, .. } => {
                if let Some(questions) = self.questions.as_mut()
                    && let Some(edit) = questions.get_mut(question_id)
                {
                    edit.set_part(*part, None);
                }
            }
        }
    }

    /// Prune every empty container so absence and emptiness stay
    /// indistinguishable.
    pub fn normalize(&mut self) {
        if let Some(checklist) = &self.checklist
            && checklist.is_empty()
        {
            self.checklist = None;
        }
        if let Some(questions) = self.questions.as_mut() {
            questions.retain(|_, edit| !edit.is_empty());
            if questions.is_empty() {
                self.questions = None;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.purpose.is_none()
            && self.core_question.is_none()
            && self.checklist.is_none()
            && self.questions.is_none()
    }

    /// Enumerate every set leaf as `(FieldRef, value)`, in stable order.
    pub fn fields(&self, asset_id: AssetId) -> Vec<(FieldRef, &str)> {
        let mut out = Vec::new();
        if let Some(title) = &self.title {
            out.push((FieldRef::title(asset_id), title.as_str()));
        }
        if let Some(purpose) = &self.purpose {
            out.push((FieldRef::purpose(asset_id), purpose.as_str()));
        }
        if let Some(core_question) = &self.core_question {
            out.push((FieldRef::core_question(asset_id), core_question.as_str()));
        }
        if let Some(checklist) = &self.checklist {
            for (item_id, value) in checklist {
                out.push((FieldRef::checklist(asset_id, item_id.clone()), value.as_str()));
            }
        }
        if let Some(questions) = &self.questions {
            for (question_id, edit) in questions {
                if let Some(label) = &edit.label {
                    out.push((
                        FieldRef::question(asset_id, question_id.clone(), QuestionPart::Label),
                        label.as_str(),
                    ));
                }
                if let Some(description) = &edit.description {
                    out.push((
                        FieldRef::question(asset_id, question_id.clone(), QuestionPart::Description),
                        description.as_str(),
                    ));
                }
            }
        }
        out
    }
}

/// Everything this writer currently believes is true: per-asset overrides
/// layered over the canonical catalog defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditTree {
    assets: BTreeMap<AssetId, AssetEdits>,
}

impl EditTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, asset_id: AssetId) -> Option<&AssetEdits> {
        self.assets.get(&asset_id)
    }

    pub fn value(&self, field: &FieldRef) -> Option<&str> {
        self.assets
            .get(&field.asset_id())
            .and_then(|edits| edits.value(field))
    }

    /// Resolve the value at `field`, absent normalized to `""`.
    pub fn value_or_default<'a>(&'a self, field: &FieldRef) -> &'a str {
        self.value(field).unwrap_or("")
    }

    /// Write `value` at `field` (empty clears). A per-asset record emptied
    /// by the write is removed entirely.
    pub fn apply(&mut self, field: &FieldRef, value: &str) {
        let asset_id = field.asset_id();
        let edits = self.assets.entry(asset_id).or_default();
        edits.apply(field, value);
        if edits.is_empty() {
            self.assets.remove(&asset_id);
        }
    }

    /// Insert a whole per-asset record, normalizing first and dropping it
    /// when nothing remains.
    pub fn insert(&mut self, asset_id: AssetId, mut edits: AssetEdits) {
        edits.normalize();
        if edits.is_empty() {
            self.assets.remove(&asset_id);
        } else {
            self.assets.insert(asset_id, edits);
        }
    }

    pub fn remove(&mut self, asset_id: AssetId) -> Option<AssetEdits> {
        self.assets.remove(&asset_id)
    }

    pub fn contains(&self, asset_id: AssetId) -> bool {
        self.assets.contains_key(&asset_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetId, &AssetEdits)> {
        self.assets.iter().map(|(id, edits)| (*id, edits))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
