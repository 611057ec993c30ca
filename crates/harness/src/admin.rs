use coedit_core::{AssetId, FieldRef, QuestionPart};
use coedit_engine::{SessionError, SyncSession};

use crate::store::SharedStore;

/// One named admin client over a shared store, pre-loaded and with
/// shorthand edit helpers for the common field kinds.
pub struct TestAdmin {
    pub session: SyncSession<SharedStore>,
}

impl TestAdmin {
    pub fn connect(store: &SharedStore, name: &str) -> Result<Self, SessionError> {
        let mut session = SyncSession::new(store.clone(), name);
        session.load()?;
        Ok(Self { session })
    }

    pub fn set_title(&mut self, asset: u32, value: &str) -> Result<(), SessionError> {
        self.session.save_edit(&FieldRef::title(AssetId::new(asset)), value)
    }

    pub fn set_purpose(&mut self, asset: u32, value: &str) -> Result<(), SessionError> {
        self.session.save_edit(&FieldRef::purpose(AssetId::new(asset)), value)
    }

    pub fn set_core_question(&mut self, asset: u32, value: &str) -> Result<(), SessionError> {
        self.session
            .save_edit(&FieldRef::core_question(AssetId::new(asset)), value)
    }

    pub fn set_checklist_item(
        &mut self,
        asset: u32,
        item: &str,
        value: &str,
    ) -> Result<(), SessionError> {
        self.session
            .save_edit(&FieldRef::checklist(AssetId::new(asset), item), value)
    }

    pub fn set_question_label(
        &mut self,
        asset: u32,
        question: &str,
        value: &str,
    ) -> Result<(), SessionError> {
        self.session.save_edit(
            &FieldRef::question(AssetId::new(asset), question, QuestionPart::Label),
            value,
        )
    }

    pub fn set_question_description(
        &mut self,
        asset: u32,
        question: &str,
        value: &str,
    ) -> Result<(), SessionError> {
        self.session.save_edit(
            &FieldRef::question(AssetId::new(asset), question, QuestionPart::Description),
            value,
        )
    }

    pub fn title(&self, asset: u32) -> Option<&str> {
        self.session.edits().value(&FieldRef::title(AssetId::new(asset)))
    }
}
