//! Merge failures, tagged with the stage that failed

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::navigation::UnresolvedTarget;
use crate::forms::MergedForm;
use crate::provider::ProviderError;

/// Stages of a merge run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStage {
    Validate,
    Fetch,
    CopyTemplate,
    Create,
    PatchNavigation,
}

impl MergeStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Fetch => "fetch",
            Self::CopyTemplate => "copy template",
            Self::Create => "create",
            Self::PatchNavigation => "patch navigation",
        }
    }
}

impl fmt::Display for MergeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("at least one source form is required")]
    NoSources,

    #[error("failed to fetch form {form_id}")]
    Fetch {
        form_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to copy template form {template_id}")]
    TemplateCopy {
        template_id: String,
        #[source]
        source: ProviderError,
    },

    /// The copied form exists but holds none of the merged items
    #[error("failed to create merged items in form {form_id}")]
    Create {
        form_id: String,
        #[source]
        source: ProviderError,
    },

    /// The merged form has its items but default branching
    #[error("merged form {} was created but its navigation could not be applied", form.id)]
    Navigation {
        form: MergedForm,
        items_created: usize,
        /// Branch targets that would have been left unresolved
        warnings: Vec<UnresolvedTarget>,
        #[source]
        source: ProviderError,
    },
}

impl MergeError {
    /// Stage at which the merge stopped
    pub fn stage(&self) -> MergeStage {
        match self {
            Self::NoSources => MergeStage::Validate,
            Self::Fetch { .. } => MergeStage::Fetch,
            Self::TemplateCopy { .. } => MergeStage::CopyTemplate,
            Self::Create { .. } => MergeStage::Create,
            Self::Navigation { .. } => MergeStage::PatchNavigation,
        }
    }

    /// Identifier of a form the failed run left behind, if any
    pub fn merged_form_id(&self) -> Option<&str> {
        match self {
            Self::Create { form_id, .. } => Some(form_id),
            Self::Navigation { form, .. } => Some(&form.id),
            _ => None,
        }
    }

    /// Whether the merged content exists and only branching is missing
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Navigation { .. })
    }
}
