//! Form resource definitions
//!
//! These types follow the provider's JSON shape (camelCase field names).
//! Fields the merge never inspects are kept in `extra` maps so that a
//! fetched item can be re-created without losing its payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const ACTION_SUBMIT_FORM: &str = "SUBMIT_FORM";
const ACTION_NEXT_SECTION: &str = "NEXT_SECTION";
const ACTION_RESTART_FORM: &str = "RESTART_FORM";

/// Form-level metadata
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A form as reported by the provider
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    #[serde(default)]
    pub form_id: String,
    #[serde(default)]
    pub info: FormInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder_uri: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FormDefinition {
    /// Display title, falling back to the document title
    pub fn display_title(&self) -> &str {
        self.info
            .title
            .as_deref()
            .or(self.info.document_title.as_deref())
            .unwrap_or("Untitled Form")
    }
}

/// A single question or content block at a fixed position in a form
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Provider-assigned identifier; absent on items not yet created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_item: Option<QuestionItem>,
    /// Other payloads (question groups, page breaks, media) passed through as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    /// Options of the item's choice question, if it has one
    pub fn choice_options(&self) -> Option<&[ChoiceOption]> {
        self.question_item
            .as_ref()
            .and_then(|q| q.question.choice_question.as_ref())
            .map(|c| c.options.as_slice())
    }

    /// Mutable access to the choice question options
    pub fn choice_options_mut(&mut self) -> Option<&mut Vec<ChoiceOption>> {
        self.question_item
            .as_mut()
            .and_then(|q| q.question.choice_question.as_mut())
            .map(|c| &mut c.options)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionItem {
    #[serde(default)]
    pub question: Question,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_question: Option<ChoiceQuestion>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Radio, checkbox or drop-down question
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceQuestion {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where the respondent goes after picking an option
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BranchTarget {
    /// Proceed to the next item
    #[default]
    Continue,
    NextSection,
    RestartForm,
    /// Terminate and submit the form
    Submit,
    /// Jump to the item with this identifier (same form)
    GoTo(String),
}

impl BranchTarget {
    /// Whether this target deviates from sequential flow
    pub fn is_navigation(&self) -> bool {
        !matches!(self, Self::Continue)
    }
}

/// One selectable option of a choice question
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawOption", into = "RawOption")]
pub struct ChoiceOption {
    pub value: String,
    pub branch: BranchTarget,
    pub extra: Map<String, Value>,
}

impl ChoiceOption {
    pub fn new(value: impl Into<String>, branch: BranchTarget) -> Self {
        Self {
            value: value.into(),
            branch,
            extra: Map::new(),
        }
    }
}

/// Wire shape of an option: the branch is split over two optional fields
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOption {
    #[serde(default)]
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    go_to_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    go_to_section_id: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<RawOption> for ChoiceOption {
    fn from(raw: RawOption) -> Self {
        let branch = match (raw.go_to_section_id, raw.go_to_action.as_deref()) {
            (Some(id), _) if !id.is_empty() => BranchTarget::GoTo(id),
            (_, Some(ACTION_SUBMIT_FORM)) => BranchTarget::Submit,
            (_, Some(ACTION_NEXT_SECTION)) => BranchTarget::NextSection,
            (_, Some(ACTION_RESTART_FORM)) => BranchTarget::RestartForm,
            _ => BranchTarget::Continue,
        };
        Self {
            value: raw.value,
            branch,
            extra: raw.extra,
        }
    }
}

impl From<ChoiceOption> for RawOption {
    fn from(option: ChoiceOption) -> Self {
        let (go_to_action, go_to_section_id) = match option.branch {
            BranchTarget::Continue => (None, None),
            BranchTarget::NextSection => (Some(ACTION_NEXT_SECTION.to_string()), None),
            BranchTarget::RestartForm => (Some(ACTION_RESTART_FORM.to_string()), None),
            BranchTarget::Submit => (Some(ACTION_SUBMIT_FORM.to_string()), None),
            BranchTarget::GoTo(id) => (None, Some(id)),
        };
        Self {
            value: option.value,
            go_to_action,
            go_to_section_id,
            extra: option.extra,
        }
    }
}

/// Handle of a form file in the document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedForm {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Listing entry for a form file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSummary {
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}
