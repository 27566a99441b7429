//! HTTP client for the Google Forms and Drive REST APIs
//!
//! Authentication is a bearer token taken from the settings; obtaining and
//! refreshing it happens elsewhere.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::ProviderError;
use super::traits::FormsProvider;
use crate::config::Settings;
use crate::forms::{FormDefinition, FormInfo, FormSummary, MergedForm};
use crate::merge::Request;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const FORM_FILES_QUERY: &str = "mimeType='application/vnd.google-apps.form' and trashed=false";
const UNTITLED_FORM: &str = "Untitled Form";

/// Forms provider backed by the Google REST APIs
pub struct GoogleFormsClient {
    http: Client,
    forms_api: String,
    drive_api: String,
    access_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateBody {
    requests: Vec<Request>,
    include_form_in_response: bool,
}

#[derive(Deserialize)]
struct BatchUpdateResponse {
    form: Option<FormDefinition>,
}

#[derive(Serialize)]
struct NewForm<'a> {
    info: &'a FormInfo,
}

#[derive(Serialize)]
struct CopyBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    web_view_link: Option<String>,
}

impl From<DriveFile> for FormSummary {
    fn from(file: DriveFile) -> Self {
        Self {
            name: file.name.unwrap_or_else(|| UNTITLED_FORM.to_string()),
            id: file.id.unwrap_or_default(),
            link: file.web_view_link,
        }
    }
}

impl GoogleFormsClient {
    /// Create a client from settings; fails without an access token
    pub fn new(settings: &Settings) -> Result<Self> {
        let access_token = settings.access_token()?.to_string();
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            forms_api: settings.forms_api_base.trim_end_matches('/').to_string(),
            drive_api: settings.drive_api_base.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn form_url(&self, form_id: &str) -> String {
        format!("{}/v1/forms/{}", self.forms_api, form_id)
    }

    fn batch_update_url(&self, form_id: &str) -> String {
        format!("{}:batchUpdate", self.form_url(form_id))
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.drive_api)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> Result<T, ProviderError> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), resource, "Provider call failed");
            return Err(ProviderError::from_status(status.as_u16(), resource, body));
        }
        Ok(response.json().await?)
    }

    async fn batch_update(
        &self,
        form_id: &str,
        requests: Vec<Request>,
        include_form_in_response: bool,
    ) -> Result<BatchUpdateResponse, ProviderError> {
        let body = BatchUpdateBody {
            requests,
            include_form_in_response,
        };
        let request = self.http.post(self.batch_update_url(form_id)).json(&body);
        self.send(request, form_id).await
    }
}

#[async_trait]
impl FormsProvider for GoogleFormsClient {
    async fn get_form(&self, form_id: &str) -> Result<FormDefinition, ProviderError> {
        tracing::debug!(form_id, "Fetching form");
        self.send(self.http.get(self.form_url(form_id)), form_id)
            .await
    }

    async fn create_form(
        &self,
        title: &str,
        document_title: &str,
    ) -> Result<FormDefinition, ProviderError> {
        let info = FormInfo {
            title: Some(title.to_string()),
            document_title: Some(document_title.to_string()),
            description: None,
        };
        let url = format!("{}/v1/forms", self.forms_api);
        let request = self.http.post(url).json(&NewForm { info: &info });
        self.send(request, document_title).await
    }

    async fn list_forms(&self) -> Result<Vec<FormSummary>, ProviderError> {
        tracing::debug!("Fetching form files");
        let request = self.http.get(self.files_url()).query(&[
            ("q", FORM_FILES_QUERY),
            ("fields", "files(id, name, webViewLink)"),
            ("spaces", "drive"),
        ]);
        let list: FileList = self.send(request, "files").await?;
        Ok(list.files.into_iter().map(FormSummary::from).collect())
    }

    async fn copy_template(
        &self,
        template_id: &str,
        document_title: Option<String>,
    ) -> Result<MergedForm, ProviderError> {
        let url = format!("{}/{}/copy", self.files_url(), template_id);
        let request = self.http.post(url).json(&CopyBody {
            name: document_title,
        });
        self.send(request, template_id).await
    }

    async fn create_items(
        &self,
        form_id: &str,
        requests: Vec<Request>,
    ) -> Result<FormDefinition, ProviderError> {
        self.batch_update(form_id, requests, true)
            .await?
            .form
            .ok_or_else(|| ProviderError::Decode("batch update response has no form".to_string()))
    }

    async fn patch_items(
        &self,
        form_id: &str,
        requests: Vec<Request>,
    ) -> Result<(), ProviderError> {
        self.batch_update(form_id, requests, false).await?;
        Ok(())
    }
}
