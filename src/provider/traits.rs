//! Trait abstraction for the forms provider to enable mocking in tests

use async_trait::async_trait;

use super::error::ProviderError;
use crate::forms::{FormDefinition, FormSummary, MergedForm};
use crate::merge::Request;

/// Operations the merge and the CLI need from the forms provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FormsProvider: Send + Sync {
    /// Fetch a form with all of its items
    async fn get_form(&self, form_id: &str) -> Result<FormDefinition, ProviderError>;

    /// Create an empty form with the given titles
    async fn create_form(
        &self,
        title: &str,
        document_title: &str,
    ) -> Result<FormDefinition, ProviderError>;

    /// List form files visible to the credentials
    async fn list_forms(&self) -> Result<Vec<FormSummary>, ProviderError>;

    /// Copy a template form file, optionally naming the copy
    async fn copy_template(
        &self,
        template_id: &str,
        document_title: Option<String>,
    ) -> Result<MergedForm, ProviderError>;

    /// Apply a batch of creations and return the resulting form
    async fn create_items(
        &self,
        form_id: &str,
        requests: Vec<Request>,
    ) -> Result<FormDefinition, ProviderError>;

    /// Apply a batch of item updates
    async fn patch_items(&self, form_id: &str, requests: Vec<Request>)
        -> Result<(), ProviderError>;
}
