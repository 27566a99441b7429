//! Translation from source coordinates to identifiers in the merged form

use std::collections::HashMap;

use crate::forms::{FormDefinition, Item};

/// Maps `(form index, item index)` in the merge order to the identifier the
/// provider assigned to the created copy of that item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierMap {
    entries: HashMap<(usize, usize), String>,
}

impl IdentifierMap {
    /// Pair the submitted items with the items the provider echoed back.
    ///
    /// Echoed item `k` belongs to submission position `k`. A short echo
    /// leaves the tail unmapped; unresolved lookups surface later as
    /// unresolved branch targets.
    pub fn build(forms: &[FormDefinition], created: &[Item]) -> Self {
        let coordinates = forms.iter().enumerate().flat_map(|(form_index, form)| {
            (0..form.items.len()).map(move |item_index| (form_index, item_index))
        });

        let entries = coordinates
            .zip(created)
            .filter_map(|(key, item)| item.item_id.clone().map(|id| (key, id)))
            .collect();

        Self { entries }
    }

    pub fn get(&self, form_index: usize, item_index: usize) -> Option<&str> {
        self.entries
            .get(&(form_index, item_index))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
