//! Item normalization before re-creation in the merged form

use serde_json::Value;

use crate::forms::{BranchTarget, Item};

const QUESTION_GROUP: &str = "questionGroupItem";

/// Prepare an item for creation in another form.
///
/// The copy has no item or question ids (the provider assigns fresh ones)
/// and no embedded newlines in its free-text fields, both of which the
/// provider rejects on creation. Option branch targets still point at identifiers of
/// the source form, so they are reset here and restored by the navigation
/// patch once the new identifiers are known.
pub fn sanitize_item(item: &Item) -> Item {
    let mut clean = item.clone();
    clean.item_id = None;
    clean.title = clean.title.as_deref().map(strip_newlines);
    clean.description = clean.description.as_deref().map(strip_newlines);

    if let Some(question_item) = clean.question_item.as_mut() {
        question_item.question.question_id = None;
    }
    if let Some(group) = clean.extra.get_mut(QUESTION_GROUP) {
        sanitize_question_group(group);
    }

    if let Some(options) = clean.choice_options_mut() {
        for option in options.iter_mut() {
            option.value = strip_newlines(&option.value);
            option.branch = BranchTarget::Continue;
        }
    }

    clean
}

/// Clean a grid question group: row question ids and titles, column option values
fn sanitize_question_group(group: &mut Value) {
    if let Some(questions) = group.get_mut("questions").and_then(Value::as_array_mut) {
        for question in questions.iter_mut().filter_map(Value::as_object_mut) {
            question.remove("questionId");
            if let Some(title) = question.get_mut("rowQuestion").and_then(|row| row.get_mut("title")) {
                strip_newlines_in_place(title);
            }
        }
    }

    let column_options = group
        .get_mut("grid")
        .and_then(|grid| grid.get_mut("columns"))
        .and_then(|columns| columns.get_mut("options"))
        .and_then(Value::as_array_mut);
    if let Some(options) = column_options {
        for value in options.iter_mut().filter_map(|option| option.get_mut("value")) {
            strip_newlines_in_place(value);
        }
    }
}

fn strip_newlines_in_place(value: &mut Value) {
    if let Value::String(text) = value {
        *text = strip_newlines(text);
    }
}

pub(super) fn strip_newlines(text: &str) -> String {
    text.replace('\n', " ")
}
