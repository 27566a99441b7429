//! Merge run: fetch, create, map identifiers, patch navigation

use futures::future::try_join_all;
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use super::error::MergeError;
use super::id_map::IdentifierMap;
use super::navigation::{plan_navigation, UnresolvedTarget};
use super::requests::{assemble_sources, build_create_requests, Request};
use crate::config::Settings;
use crate::forms::{FormDefinition, MergedForm};
use crate::provider::FormsProvider;

/// What to merge and how to name the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    /// Selected forms, in the order their items should appear
    pub form_ids: Vec<String>,
    pub title: String,
    pub document_title: Option<String>,
}

impl MergeRequest {
    pub fn new(form_ids: Vec<String>, title: impl Into<String>) -> Self {
        Self {
            form_ids,
            title: title.into(),
            document_title: None,
        }
    }

    pub fn with_document_title(mut self, document_title: impl Into<String>) -> Self {
        self.document_title = Some(document_title.into());
        self
    }
}

/// Result of a completed merge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub form: MergedForm,
    pub items_created: usize,
    pub navigation_updates: usize,
    /// Branch targets left as they were in their source form
    pub warnings: Vec<UnresolvedTarget>,
}

/// Runs merges against a forms provider
pub struct FormMerger<P> {
    provider: P,
    intro_form_id: String,
    template_form_id: String,
}

impl<P: FormsProvider> FormMerger<P> {
    pub fn new(provider: P, settings: &Settings) -> Self {
        Self {
            provider,
            intro_form_id: settings.intro_form_id.clone(),
            template_form_id: settings.template_form_id.clone(),
        }
    }

    /// Merge the requested forms behind the introduction form.
    ///
    /// The run stops at the first failing stage. A failure after the items
    /// were created leaves the merged form in place and is reported as
    /// [`MergeError::Navigation`].
    pub async fn merge(&self, request: &MergeRequest) -> Result<MergeOutcome, MergeError> {
        let run_id = Uuid::new_v4();
        self.run(request)
            .instrument(tracing::info_span!("merge", %run_id))
            .await
    }

    async fn run(&self, request: &MergeRequest) -> Result<MergeOutcome, MergeError> {
        if request.form_ids.is_empty() {
            return Err(MergeError::NoSources);
        }

        tracing::info!(sources = request.form_ids.len(), "Fetching forms");
        let (intro, selected) = futures::try_join!(
            self.fetch(&self.intro_form_id),
            try_join_all(request.form_ids.iter().map(|id| self.fetch(id))),
        )?;

        let forms = assemble_sources(intro, selected);
        let inserts = build_create_requests(&forms);
        let items_created = inserts.len();
        tracing::debug!(items = items_created, forms = forms.len(), "Built create requests");

        let form = self
            .provider
            .copy_template(&self.template_form_id, request.document_title.clone())
            .await
            .map_err(|source| {
                tracing::error!(error = %source, "Template copy failed");
                MergeError::TemplateCopy {
                    template_id: self.template_form_id.clone(),
                    source,
                }
            })?;

        tracing::info!(form_id = %form.id, items = items_created, "Creating merged items");
        let requests = std::iter::once(Request::update_title(&request.title))
            .chain(inserts)
            .collect();
        let created = self
            .provider
            .create_items(&form.id, requests)
            .await
            .map_err(|source| {
                tracing::error!(form_id = %form.id, error = %source, "Item creation failed");
                MergeError::Create {
                    form_id: form.id.clone(),
                    source,
                }
            })?;

        let ids = IdentifierMap::build(&forms, &created.items);
        if ids.len() < items_created {
            tracing::warn!(
                submitted = items_created,
                mapped = ids.len(),
                "Provider reported fewer items than were created"
            );
        }

        let plan = plan_navigation(&forms, &ids);
        let navigation_updates = plan.updates.len();
        if plan.updates.is_empty() {
            tracing::info!(form_id = %form.id, "No navigation to patch");
        } else {
            tracing::info!(form_id = %form.id, updates = navigation_updates, "Patching navigation");
            if let Err(source) = self.provider.patch_items(&form.id, plan.updates).await {
                tracing::error!(form_id = %form.id, error = %source, "Navigation patch failed");
                return Err(MergeError::Navigation {
                    form,
                    items_created,
                    warnings: plan.unresolved,
                    source,
                });
            }
        }

        tracing::info!(
            form_id = %form.id,
            warnings = plan.unresolved.len(),
            "Merge complete"
        );
        Ok(MergeOutcome {
            form,
            items_created,
            navigation_updates,
            warnings: plan.unresolved,
        })
    }

    async fn fetch(&self, form_id: &str) -> Result<FormDefinition, MergeError> {
        let form = self.provider.get_form(form_id).await.map_err(|source| {
            tracing::error!(form_id, error = %source, "Fetch failed");
            MergeError::Fetch {
                form_id: form_id.to_string(),
                source,
            }
        })?;
        tracing::debug!(
            form_id,
            title = form.display_title(),
            items = form.items.len(),
            "Fetched form"
        );
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::{BranchTarget, ChoiceOption, ChoiceQuestion, Item, Question, QuestionItem};
    use crate::merge::error::MergeStage;
    use crate::merge::navigation::UnresolvedReason;
    use crate::provider::{MockFormsProvider, ProviderError};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    const INTRO: &str = "intro";
    const TEMPLATE: &str = "template";
    const MERGED: &str = "merged";

    fn settings() -> Settings {
        Settings {
            intro_form_id: INTRO.to_string(),
            template_form_id: TEMPLATE.to_string(),
            ..Default::default()
        }
    }

    fn plain(id: &str) -> Item {
        Item {
            item_id: Some(id.to_string()),
            title: Some(id.to_string()),
            ..Default::default()
        }
    }

    fn choice(id: &str, options: Vec<ChoiceOption>) -> Item {
        Item {
            question_item: Some(QuestionItem {
                question: Question {
                    choice_question: Some(ChoiceQuestion {
                        kind: Some("RADIO".to_string()),
                        options,
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..plain(id)
        }
    }

    fn form(id: &str, items: Vec<Item>) -> FormDefinition {
        FormDefinition {
            form_id: id.to_string(),
            items,
            ..Default::default()
        }
    }

    /// Four leading items that repeat the introduction questions
    fn overlap(prefix: &str) -> Vec<Item> {
        (0..4).map(|i| plain(&format!("{prefix}{i}"))).collect()
    }

    /// Provider reply to a create batch: item k gets id "new{k}"
    fn echo(requests: &[Request]) -> FormDefinition {
        let items = requests
            .iter()
            .filter_map(|r| match r {
                Request::InsertItem { item, index } => Some(Item {
                    item_id: Some(format!("new{index}")),
                    ..item.clone()
                }),
                _ => None,
            })
            .collect();
        form(MERGED, items)
    }

    fn expect_forms(mock: &mut MockFormsProvider, forms: Vec<FormDefinition>) {
        let by_id: HashMap<String, FormDefinition> = forms
            .into_iter()
            .map(|f| (f.form_id.clone(), f))
            .collect();
        mock.expect_get_form().returning(move |form_id: &str| {
            by_id
                .get(form_id)
                .cloned()
                .ok_or_else(|| ProviderError::NotFound(form_id.to_string()))
        });
    }

    fn expect_copy(mock: &mut MockFormsProvider) {
        mock.expect_copy_template()
            .times(1)
            .returning(|_: &str, name: Option<String>| {
                Ok(MergedForm {
                    id: MERGED.to_string(),
                    name,
                })
            });
    }

    fn expect_create(mock: &mut MockFormsProvider) -> Arc<Mutex<Vec<Request>>> {
        let submitted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&submitted);
        mock.expect_create_items()
            .times(1)
            .returning(move |_: &str, requests: Vec<Request>| {
                let reply = echo(&requests);
                *sink.lock().unwrap() = requests;
                Ok(reply)
            });
        submitted
    }

    fn expect_patch(mock: &mut MockFormsProvider) -> Arc<Mutex<Vec<Request>>> {
        let patched = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&patched);
        mock.expect_patch_items()
            .times(1)
            .returning(move |_: &str, requests: Vec<Request>| {
                *sink.lock().unwrap() = requests;
                Ok(())
            });
        patched
    }

    fn inserted_titles(requests: &[Request]) -> Vec<String> {
        requests
            .iter()
            .filter_map(|r| match r {
                Request::InsertItem { item, .. } => item.title.clone(),
                _ => None,
            })
            .collect()
    }

    fn navigation_of(requests: &[Request], item_id: &str) -> Vec<BranchTarget> {
        requests
            .iter()
            .find_map(|r| match r {
                Request::UpdateNavigation {
                    item_id: id,
                    options,
                    ..
                } if id == item_id => Some(options.iter().map(|o| o.branch.clone()).collect()),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no navigation update for {item_id}"))
    }

    fn request(ids: &[&str]) -> MergeRequest {
        MergeRequest::new(ids.iter().map(|s| s.to_string()).collect(), "Merged")
    }

    #[tokio::test]
    async fn test_merge_orders_items_and_stitches_forms() {
        let mut mock = MockFormsProvider::new();
        let mut a_items = overlap("a");
        a_items.push(plain("a4"));
        a_items.push(choice(
            "a5",
            vec![
                ChoiceOption::new("Yes", BranchTarget::GoTo("a4".to_string())),
                ChoiceOption::new("No", BranchTarget::Submit),
            ],
        ));
        let mut b_items = overlap("b");
        b_items.push(plain("b4"));
        b_items.push(choice(
            "b5",
            vec![ChoiceOption::new("Done", BranchTarget::Submit)],
        ));
        expect_forms(
            &mut mock,
            vec![
                form(INTRO, vec![plain("i0"), plain("i1")]),
                form("a", a_items),
                form("b", b_items),
            ],
        );
        expect_copy(&mut mock);
        let submitted = expect_create(&mut mock);
        let patched = expect_patch(&mut mock);

        let merger = FormMerger::new(mock, &settings());
        let outcome = merger.merge(&request(&["a", "b"])).await.unwrap();

        let submitted = submitted.lock().unwrap();
        assert_eq!(submitted[0], Request::update_title("Merged"));
        assert_eq!(
            inserted_titles(&submitted),
            vec!["i0", "i1", "a4", "a5", "b4", "b5"]
        );

        // a5 sits at position 3, a4 at 2, b4 (first of the next form) at 4
        let patched = patched.lock().unwrap();
        assert_eq!(patched.len(), 2);
        assert_eq!(
            navigation_of(&patched, "new3"),
            vec![
                BranchTarget::GoTo("new2".to_string()),
                BranchTarget::GoTo("new4".to_string()),
            ]
        );
        assert_eq!(navigation_of(&patched, "new5"), vec![BranchTarget::Submit]);

        assert_eq!(outcome.form.id, MERGED);
        assert_eq!(outcome.items_created, 6);
        assert_eq!(outcome.navigation_updates, 2);
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_created_items_carry_no_identifiers() {
        let mut mock = MockFormsProvider::new();
        let mut a_items = overlap("a");
        a_items.push(plain("a4"));
        expect_forms(
            &mut mock,
            vec![form(INTRO, vec![plain("i0")]), form("a", a_items)],
        );
        expect_copy(&mut mock);
        let submitted = expect_create(&mut mock);
        mock.expect_patch_items().never();

        let merger = FormMerger::new(mock, &settings());
        merger.merge(&request(&["a"])).await.unwrap();

        for r in submitted.lock().unwrap().iter() {
            if let Request::InsertItem { item, .. } = r {
                assert!(item.item_id.is_none());
            }
        }
    }

    #[tokio::test]
    async fn test_multiline_options_are_flattened_in_both_batches() {
        let mut mock = MockFormsProvider::new();
        let mut a_items = overlap("a");
        a_items.push(choice(
            "a4",
            vec![
                ChoiceOption::new("Yes,\ndaily", BranchTarget::Submit),
                ChoiceOption::new("No", BranchTarget::Continue),
            ],
        ));
        expect_forms(
            &mut mock,
            vec![
                form(INTRO, vec![plain("i0")]),
                form("a", a_items.clone()),
                form("b", a_items),
            ],
        );
        expect_copy(&mut mock);
        let submitted = expect_create(&mut mock);
        let patched = expect_patch(&mut mock);

        let merger = FormMerger::new(mock, &settings());
        merger.merge(&request(&["a", "b"])).await.unwrap();

        let option_values = |requests: &[Request]| -> Vec<String> {
            requests
                .iter()
                .flat_map(|r| match r {
                    Request::InsertItem { item, .. } => item
                        .choice_options()
                        .unwrap_or_default()
                        .iter()
                        .map(|o| o.value.clone())
                        .collect(),
                    Request::UpdateNavigation { options, .. } => {
                        options.iter().map(|o| o.value.clone()).collect()
                    }
                    _ => Vec::new(),
                })
                .collect()
        };
        let created = option_values(&submitted.lock().unwrap());
        let patched = option_values(&patched.lock().unwrap());
        assert_eq!(created.len(), 4);
        assert_eq!(patched.len(), 4);
        assert!(created.iter().chain(&patched).all(|v| !v.contains('\n')));
        assert!(patched.contains(&"Yes, daily".to_string()));
    }

    #[tokio::test]
    async fn test_same_form_twice_shares_no_question_ids() {
        let mut mock = MockFormsProvider::new();
        let mut a_items = overlap("a");
        let mut question = choice("a4", vec![ChoiceOption::new("x", BranchTarget::Continue)]);
        if let Some(q) = question.question_item.as_mut() {
            q.question.question_id = Some("q4".to_string());
        }
        a_items.push(question);
        expect_forms(
            &mut mock,
            vec![form(INTRO, vec![]), form("a", a_items)],
        );
        expect_copy(&mut mock);
        let submitted = expect_create(&mut mock);

        let merger = FormMerger::new(mock, &settings());
        merger.merge(&request(&["a", "a"])).await.unwrap();

        for r in submitted.lock().unwrap().iter() {
            if let Request::InsertItem { item, .. } = r {
                let question = &item.question_item.as_ref().unwrap().question;
                assert!(question.question_id.is_none());
            }
        }
    }

    #[tokio::test]
    async fn test_no_navigation_skips_patch() {
        let mut mock = MockFormsProvider::new();
        let mut a_items = overlap("a");
        a_items.push(choice(
            "a4",
            vec![ChoiceOption::new("x", BranchTarget::Continue)],
        ));
        expect_forms(
            &mut mock,
            vec![form(INTRO, vec![plain("i0")]), form("a", a_items)],
        );
        expect_copy(&mut mock);
        expect_create(&mut mock);
        mock.expect_patch_items().never();

        let merger = FormMerger::new(mock, &settings());
        let outcome = merger.merge(&request(&["a"])).await.unwrap();
        assert_eq!(outcome.navigation_updates, 0);
    }

    #[tokio::test]
    async fn test_next_form_with_no_items_after_trim_keeps_submit() {
        let mut mock = MockFormsProvider::new();
        let mut a_items = overlap("a");
        a_items.push(plain("a4"));
        a_items.push(choice(
            "a5",
            vec![ChoiceOption::new("No", BranchTarget::Submit)],
        ));
        expect_forms(
            &mut mock,
            vec![
                form(INTRO, vec![plain("i0")]),
                form("a", a_items),
                form("b", overlap("b")),
            ],
        );
        expect_copy(&mut mock);
        let submitted = expect_create(&mut mock);
        let patched = expect_patch(&mut mock);

        let merger = FormMerger::new(mock, &settings());
        let outcome = merger.merge(&request(&["a", "b"])).await.unwrap();

        assert_eq!(
            inserted_titles(&submitted.lock().unwrap()),
            vec!["i0", "a4", "a5"]
        );
        assert_eq!(
            navigation_of(&patched.lock().unwrap(), "new2"),
            vec![BranchTarget::Submit]
        );
        assert_eq!(
            outcome.warnings[0].reason,
            UnresolvedReason::NextFormEmpty { next_form: 2 }
        );
    }

    #[tokio::test]
    async fn test_intro_submit_hands_off_to_first_selected_item() {
        let mut mock = MockFormsProvider::new();
        let mut a_items = overlap("a");
        a_items.push(plain("a4"));
        expect_forms(
            &mut mock,
            vec![
                form(
                    INTRO,
                    vec![choice("i0", vec![ChoiceOption::new("No", BranchTarget::Submit)])],
                ),
                form("a", a_items),
            ],
        );
        expect_copy(&mut mock);
        expect_create(&mut mock);
        let patched = expect_patch(&mut mock);

        let merger = FormMerger::new(mock, &settings());
        merger.merge(&request(&["a"])).await.unwrap();
        assert_eq!(
            navigation_of(&patched.lock().unwrap(), "new0"),
            vec![BranchTarget::GoTo("new1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_document_title_names_the_copy() {
        let mut mock = MockFormsProvider::new();
        expect_forms(&mut mock, vec![form(INTRO, vec![]), form("a", vec![])]);
        mock.expect_copy_template()
            .withf(|template_id: &str, name: &Option<String>| {
                template_id == TEMPLATE && name.as_deref() == Some("ETI - Smith")
            })
            .times(1)
            .returning(|_: &str, name: Option<String>| {
                Ok(MergedForm {
                    id: MERGED.to_string(),
                    name,
                })
            });
        expect_create(&mut mock);

        let merger = FormMerger::new(mock, &settings());
        let outcome = merger
            .merge(&request(&["a"]).with_document_title("ETI - Smith"))
            .await
            .unwrap();
        assert_eq!(outcome.form.name.as_deref(), Some("ETI - Smith"));
        assert_eq!(outcome.items_created, 0);
    }

    #[tokio::test]
    async fn test_empty_source_list_is_rejected() {
        let mut mock = MockFormsProvider::new();
        mock.expect_get_form().never();
        let merger = FormMerger::new(mock, &settings());
        let err = merger.merge(&request(&[])).await.unwrap_err();
        assert!(matches!(err, MergeError::NoSources));
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_before_mutation() {
        let mut mock = MockFormsProvider::new();
        expect_forms(&mut mock, vec![form(INTRO, vec![]), form("a", vec![])]);
        mock.expect_copy_template().never();
        mock.expect_create_items().never();

        let merger = FormMerger::new(mock, &settings());
        let err = merger.merge(&request(&["a", "missing"])).await.unwrap_err();
        assert_eq!(err.stage(), MergeStage::Fetch);
        assert!(err.merged_form_id().is_none());
        assert!(matches!(
            err,
            MergeError::Fetch { ref form_id, source: ProviderError::NotFound(_) } if form_id == "missing"
        ));
    }

    #[tokio::test]
    async fn test_create_failure_reports_copied_form() {
        let mut mock = MockFormsProvider::new();
        expect_forms(&mut mock, vec![form(INTRO, vec![plain("i0")]), form("a", vec![])]);
        expect_copy(&mut mock);
        mock.expect_create_items().times(1).returning(|_: &str, _| {
            Err(ProviderError::Rejected {
                status: 400,
                message: "Invalid item".to_string(),
            })
        });
        mock.expect_patch_items().never();

        let merger = FormMerger::new(mock, &settings());
        let err = merger.merge(&request(&["a"])).await.unwrap_err();
        assert_eq!(err.stage(), MergeStage::Create);
        assert_eq!(err.merged_form_id(), Some(MERGED));
    }

    #[tokio::test]
    async fn test_patch_failure_is_partial_merge() {
        let mut mock = MockFormsProvider::new();
        expect_forms(
            &mut mock,
            vec![
                form(
                    INTRO,
                    vec![choice("i0", vec![ChoiceOption::new("No", BranchTarget::Submit)])],
                ),
                form("a", vec![]),
            ],
        );
        expect_copy(&mut mock);
        expect_create(&mut mock);
        mock.expect_patch_items()
            .times(1)
            .returning(|_: &str, _| Err(ProviderError::Transport("timeout".to_string())));

        let merger = FormMerger::new(mock, &settings());
        let err = merger.merge(&request(&["a"])).await.unwrap_err();
        assert!(err.is_partial());
        assert_eq!(err.stage(), MergeStage::PatchNavigation);
        assert_eq!(err.merged_form_id(), Some(MERGED));
        match err {
            MergeError::Navigation {
                items_created,
                warnings,
                ..
            } => {
                assert_eq!(items_created, 1);
                assert_eq!(warnings.len(), 1);
                assert_eq!(
                    warnings[0].reason,
                    UnresolvedReason::NextFormEmpty { next_form: 1 }
                );
            }
            other => panic!("expected partial merge, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_request_builder() {
        let request = MergeRequest::new(vec!["a".to_string()], "Title").with_document_title("Doc");
        assert_eq!(request.title, "Title");
        assert_eq!(request.document_title.as_deref(), Some("Doc"));
    }

    #[test]
    fn test_template_copy_failure_is_reported() {
        let mut mock = MockFormsProvider::new();
        expect_forms(&mut mock, vec![form(INTRO, vec![]), form("a", vec![])]);
        mock.expect_copy_template()
            .times(1)
            .returning(|_: &str, _| Err(ProviderError::Unauthorized("expired".to_string())));
        mock.expect_create_items().never();

        let merger = FormMerger::new(mock, &settings());
        let err = tokio_test::block_on(merger.merge(&request(&["a"]))).unwrap_err();
        assert_eq!(err.stage(), MergeStage::CopyTemplate);
        assert!(err.merged_form_id().is_none());
    }
}
