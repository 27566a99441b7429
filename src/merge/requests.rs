//! Batch update requests sent to the forms provider
//!
//! `Request` is the closed set of mutations the merge issues. Each variant
//! carries only what it needs; the provider's nested JSON shape (locations,
//! update masks) is produced at serialization time.

use serde::{Serialize, Serializer};

use super::sanitize::sanitize_item;
use crate::forms::{ChoiceOption, FormDefinition, Item};

/// Number of leading items of every selected form that repeat the
/// introduction form's questions and are dropped before merging.
pub const INTRO_OVERLAP: usize = 4;

const TITLE_MASK: &str = "title";
const OPTIONS_MASK: &str = "questionItem.question.choiceQuestion.options";

/// A single mutation within a batch update
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Replace the form title
    UpdateTitle { title: String },
    /// Create `item` at `index`
    InsertItem { item: Item, index: usize },
    /// Overwrite the choice options (and their branch targets) of an existing item
    UpdateNavigation {
        item_id: String,
        options: Vec<ChoiceOption>,
        index: usize,
    },
}

impl Request {
    pub fn update_title(title: impl Into<String>) -> Self {
        Self::UpdateTitle {
            title: title.into(),
        }
    }

    /// Position the request addresses, if any
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::UpdateTitle { .. } => None,
            Self::InsertItem { index, .. } | Self::UpdateNavigation { index, .. } => Some(*index),
        }
    }
}

/// Put the introduction form first and drop the overlapping leading items
/// of every selected form. Forms shorter than the overlap contribute nothing.
pub fn assemble_sources(
    intro: FormDefinition,
    selected: Vec<FormDefinition>,
) -> Vec<FormDefinition> {
    std::iter::once(intro)
        .chain(selected.into_iter().map(|mut form| {
            let overlap = INTRO_OVERLAP.min(form.items.len());
            form.items.drain(..overlap);
            form
        }))
        .collect()
}

/// Build one insert per item across all forms, positioned by a single
/// counter that runs over form boundaries in merge order.
pub fn build_create_requests(forms: &[FormDefinition]) -> Vec<Request> {
    forms
        .iter()
        .flat_map(|form| form.items.iter())
        .enumerate()
        .map(|(index, item)| Request::InsertItem {
            item: sanitize_item(item),
            index,
        })
        .collect()
}

impl Serialize for Request {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireRequest::from(self).serialize(serializer)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum WireRequest<'a> {
    UpdateFormInfo {
        info: TitleInfo<'a>,
        #[serde(rename = "updateMask")]
        update_mask: &'static str,
    },
    CreateItem {
        item: &'a Item,
        location: Location,
    },
    UpdateItem {
        item: OptionsPatch<'a>,
        location: Location,
        #[serde(rename = "updateMask")]
        update_mask: &'static str,
    },
}

#[derive(Serialize)]
struct TitleInfo<'a> {
    title: &'a str,
}

#[derive(Serialize)]
struct Location {
    index: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OptionsPatch<'a> {
    item_id: &'a str,
    question_item: PatchQuestionItem<'a>,
}

#[derive(Serialize)]
struct PatchQuestionItem<'a> {
    question: PatchQuestion<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PatchQuestion<'a> {
    choice_question: PatchChoiceQuestion<'a>,
}

#[derive(Serialize)]
struct PatchChoiceQuestion<'a> {
    options: &'a [ChoiceOption],
}

impl<'a> From<&'a Request> for WireRequest<'a> {
    fn from(request: &'a Request) -> Self {
        match request {
            Request::UpdateTitle { title } => Self::UpdateFormInfo {
                info: TitleInfo { title },
                update_mask: TITLE_MASK,
            },
            Request::InsertItem { item, index } => Self::CreateItem {
                item,
                location: Location { index: *index },
            },
            Request::UpdateNavigation {
                item_id,
                options,
                index,
            } => Self::UpdateItem {
                item: OptionsPatch {
                    item_id,
                    question_item: PatchQuestionItem {
                        question: PatchQuestion {
                            choice_question: PatchChoiceQuestion { options },
                        },
                    },
                },
                location: Location { index: *index },
                update_mask: OPTIONS_MASK,
            },
        }
    }
}
