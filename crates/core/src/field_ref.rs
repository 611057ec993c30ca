use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::ids::AssetId;

/// Separator used in the flat key form. Rejected inside sub ids so the
/// round trip through `to_key`/`parse_key` stays lossless.
pub const KEY_SEPARATOR: char = '|';

/// Which half of a question override a field addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QuestionPart {
    Label,
    Description,
}

impl QuestionPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Description => "description",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "label" => Ok(Self::Label),
            "description" => Ok(Self::Description),
            _ => Err(CoreError::UnknownQuestionPart(s.to_string())),
        }
    }
}

/// Address of one editable leaf: an asset plus the exact field within it.
///
/// Scalar kinds carry no sub components; `Checklist` is keyed by the
/// checklist item id; `Question` by the question id and which part of the
/// override is addressed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldRef {
    Title { asset_id: AssetId },
    Purpose { asset_id: AssetId },
    CoreQuestion { asset_id: AssetId },
    Checklist { asset_id: AssetId, item_id: String },
    Question { asset_id: AssetId, question_id: String, part: QuestionPart },
}

impl FieldRef {
    pub fn title(asset_id: AssetId) -> Self {
        Self::Title { asset_id }
    }

    pub fn purpose(asset_id: AssetId) -> Self {
        Self::Purpose { asset_id }
    }

    pub fn core_question(asset_id: AssetId) -> Self {
        Self::CoreQuestion { asset_id }
    }

    pub fn checklist(asset_id: AssetId, item_id: impl Into<String>) -> Self {
        Self::Checklist {
            asset_id,
            item_id: item_id.into(),
        }
    }

    pub fn question(asset_id: AssetId, question_id: impl Into<String>, part: QuestionPart) -> Self {
        Self::Question {
            asset_id,
            question_id: question_id.into(),
            part,
        }
    }

    pub fn asset_id(&self) -> AssetId {
        match self {
            Self::Title { asset_id }
            | Self::Purpose { asset_id }
            | Self::CoreQuestion { asset_id }
            | Self::Checklist { asset_id, .. }
            | Self::Question { asset_id, .. } => *asset_id,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Title { .. } => "title",
            Self::Purpose { .. } => "purpose",
            Self::CoreQuestion { .. } => "core_question",
            Self::Checklist { .. } => "checklist",
            Self::Question { .. } => "question",
        }
    }

    pub fn sub_id(&self) -> &str {
        match self {
            Self::Checklist { item_id, .. } => item_id,
            Self::Question { question_id, .. } => question_id,
            _ => "",
        }
    }

    pub fn sub_key(&self) -> &str {
        match self {
            Self::Question { part, .. } => part.as_str(),
            _ => "",
        }
    }

    /// Flat `"{asset}|{kind}|{sub_id}|{sub_key}"` form, suitable as a
    /// set/map key.
    pub fn to_key(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}",
            self.asset_id(),
            self.kind_str(),
            self.sub_id(),
            self.sub_key(),
            sep = KEY_SEPARATOR,
        )
    }

    pub fn parse_key(key: &str) -> Result<Self, CoreError> {
        let parts: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        let [asset, kind, sub_id, sub_key] = parts.as_slice() else {
            return Err(CoreError::InvalidFieldKey(key.to_string()));
        };
        let asset_id: AssetId = asset
            .parse()
            .map_err(|_| CoreError::InvalidAssetId(asset.to_string()))?;
        Self::from_parts(asset_id, kind, sub_id, sub_key)
    }

    /// Rebuild a `FieldRef` from its four stored components.
    pub fn from_parts(
        asset_id: AssetId,
        kind: &str,
        sub_id: &str,
        sub_key: &str,
    ) -> Result<Self, CoreError> {
        let reject_subs = |field: Self| {
            if sub_id.is_empty() && sub_key.is_empty() {
                Ok(field)
            } else {
                Err(CoreError::InvalidFieldKey(format!(
                    "{kind} field carries sub components: {sub_id:?}/{sub_key:?}"
                )))
            }
        };
        if sub_id.contains(KEY_SEPARATOR) || sub_key.contains(KEY_SEPARATOR) {
            return Err(CoreError::InvalidFieldKey(format!(
                "sub components must not contain {KEY_SEPARATOR:?}"
            )));
        }
        match kind {
            "title" => reject_subs(Self::Title { asset_id }),
            "purpose" => reject_subs(Self::Purpose { asset_id }),
            "core_question" => reject_subs(Self::CoreQuestion { asset_id }),
            "checklist" => {
                if sub_id.is_empty() || !sub_key.is_empty() {
                    return Err(CoreError::InvalidFieldKey(format!(
                        "checklist field needs an item id and no sub key: {sub_id:?}/{sub_key:?}"
                    )));
                }
                Ok(Self::Checklist {
                    asset_id,
                    item_id: sub_id.to_string(),
                })
            }
            "question" => {
                if sub_id.is_empty() {
                    return Err(CoreError::InvalidFieldKey(
                        "question field needs a question id".to_string(),
                    ));
                }
                Ok(Self::Question {
                    asset_id,
                    question_id: sub_id.to_string(),
                    part: QuestionPart::parse(sub_key)?,
                })
            }
            _ => Err(CoreError::UnknownFieldKind(kind.to_string())),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key())
    }
}
