use coedit_core::{EditTree, FieldRef};

use crate::dirty::DirtySet;

/// A dirty field whose freshly fetched server value disagrees with the
/// local one. Absent values are normalized to `""` on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub field: FieldRef,
    pub local_value: String,
    pub server_value: String,
}

/// Diff `local` against `server`, restricted to the dirty set.
///
/// Fields outside the dirty set never conflict, whatever the server says:
/// those are unilateral server-side changes and are accepted silently.
/// Output order follows dirty-set iteration order.
pub fn detect_conflicts(local: &EditTree, server: &EditTree, dirty: &DirtySet) -> Vec<Conflict> {
    dirty
        .iter()
        .filter_map(|field| {
            let local_value = local.value_or_default(field);
            let server_value = server.value_or_default(field);
            (local_value != server_value).then(|| Conflict {
                field: field.clone(),
                local_value: local_value.to_string(),
                server_value: server_value.to_string(),
            })
        })
        .collect()
}
