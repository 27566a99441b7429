//! Branch target rewriting for the merged form
//!
//! Once the merged items exist, every choice option that branched inside its
//! source form is pointed at the corresponding item of the merged form. A
//! source form that used to submit hands off to the first item of the next
//! merged form instead. Targets that cannot be translated are left as they
//! were and reported, never rejected.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::id_map::IdentifierMap;
use super::requests::Request;
use super::sanitize::strip_newlines;
use crate::forms::{BranchTarget, ChoiceOption, FormDefinition, Item};

/// Whether any option of the item deviates from sequential flow
pub fn has_navigation(item: &Item) -> bool {
    item.choice_options()
        .is_some_and(|options| options.iter().any(|o| o.branch.is_navigation()))
}

/// Why a branch could not be translated into the merged form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// No merged form contains an item with this original identifier
    UnknownTarget { target: String },
    /// The target item was found but the provider did not report its copy
    TargetNotCreated { target: String },
    /// A submit option should hand off to the next form, which has no items
    NextFormEmpty { next_form: usize },
    /// The next form has items but the provider did not report the copy of its first
    NextFormNotCreated { next_form: usize },
    /// The branching item itself was not reported back by the provider
    ItemNotCreated,
}

/// A branch left untouched during rewriting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedTarget {
    pub form_index: usize,
    pub item_index: usize,
    /// Display value of the option, empty for `ItemNotCreated`
    pub option: String,
    #[serde(flatten)]
    pub reason: UnresolvedReason,
}

impl fmt::Display for UnresolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "form {} item {}", self.form_index, self.item_index)?;
        if !self.option.is_empty() {
            write!(f, " option {:?}", self.option)?;
        }
        match &self.reason {
            UnresolvedReason::UnknownTarget { target } => {
                write!(f, ": target {target} is not in any merged form")
            }
            UnresolvedReason::TargetNotCreated { target } => {
                write!(f, ": copy of target {target} was not created")
            }
            UnresolvedReason::NextFormEmpty { next_form } => {
                write!(f, ": form {next_form} has no items, submit kept")
            }
            UnresolvedReason::NextFormNotCreated { next_form } => {
                write!(f, ": first item of form {next_form} was not created, submit kept")
            }
            UnresolvedReason::ItemNotCreated => write!(f, ": item was not created"),
        }
    }
}

/// Navigation patch for a merged form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationPlan {
    /// `UpdateNavigation` requests in merge order
    pub updates: Vec<Request>,
    pub unresolved: Vec<UnresolvedTarget>,
}

/// Original item identifier to its first `(form, item)` position in merge order
struct TargetIndex<'a> {
    positions: HashMap<&'a str, (usize, usize)>,
}

impl<'a> TargetIndex<'a> {
    fn new(forms: &'a [FormDefinition]) -> Self {
        let mut positions = HashMap::new();
        for (form_index, form) in forms.iter().enumerate() {
            for (item_index, item) in form.items.iter().enumerate() {
                if let Some(id) = item.item_id.as_deref() {
                    positions.entry(id).or_insert((form_index, item_index));
                }
            }
        }
        Self { positions }
    }

    fn locate(&self, original_id: &str) -> Option<(usize, usize)> {
        self.positions.get(original_id).copied()
    }
}

struct Rewriter<'a> {
    forms: &'a [FormDefinition],
    ids: &'a IdentifierMap,
    targets: TargetIndex<'a>,
    last_form: usize,
}

impl Rewriter<'_> {
    fn rewrite(
        &self,
        option: &ChoiceOption,
        form_index: usize,
    ) -> (ChoiceOption, Option<UnresolvedReason>) {
        let mut rewritten = option.clone();
        rewritten.value = strip_newlines(&option.value);
        let unresolved = match &option.branch {
            BranchTarget::Submit if form_index < self.last_form => {
                let next_form = form_index + 1;
                match self.ids.get(next_form, 0) {
                    Some(first) => {
                        rewritten.branch = BranchTarget::GoTo(first.to_string());
                        None
                    }
                    None if self.forms[next_form].items.is_empty() => {
                        Some(UnresolvedReason::NextFormEmpty { next_form })
                    }
                    None => Some(UnresolvedReason::NextFormNotCreated { next_form }),
                }
            }
            BranchTarget::GoTo(target) => match self.targets.locate(target) {
                Some((f, i)) => match self.ids.get(f, i) {
                    Some(new_id) => {
                        rewritten.branch = BranchTarget::GoTo(new_id.to_string());
                        None
                    }
                    None => Some(UnresolvedReason::TargetNotCreated {
                        target: target.clone(),
                    }),
                },
                None => Some(UnresolvedReason::UnknownTarget {
                    target: target.clone(),
                }),
            },
            _ => None,
        };
        (rewritten, unresolved)
    }
}

/// Build the navigation patch for the merged form.
///
/// `forms` must be the exact sequence the create requests were built from;
/// update positions reuse that global counter.
pub fn plan_navigation(forms: &[FormDefinition], ids: &IdentifierMap) -> NavigationPlan {
    let rewriter = Rewriter {
        forms,
        ids,
        targets: TargetIndex::new(forms),
        last_form: forms.len().saturating_sub(1),
    };

    forms
        .iter()
        .enumerate()
        .flat_map(|(form_index, form)| {
            form.items
                .iter()
                .enumerate()
                .map(move |(item_index, item)| (form_index, item_index, item))
        })
        .enumerate()
        .filter(|(_, (_, _, item))| has_navigation(item))
        .fold(
            NavigationPlan::default(),
            |mut plan, (position, (form_index, item_index, item))| {
                let Some(item_id) = ids.get(form_index, item_index) else {
                    tracing::warn!(form_index, item_index, "Branching item has no merged copy");
                    plan.unresolved.push(UnresolvedTarget {
                        form_index,
                        item_index,
                        option: String::new(),
                        reason: UnresolvedReason::ItemNotCreated,
                    });
                    return plan;
                };

                let options = item
                    .choice_options()
                    .unwrap_or_default()
                    .iter()
                    .map(|option| {
                        let (rewritten, unresolved) = rewriter.rewrite(option, form_index);
                        if let Some(reason) = unresolved {
                            let unresolved = UnresolvedTarget {
                                form_index,
                                item_index,
                                option: option.value.clone(),
                                reason,
                            };
                            tracing::warn!(detail = %unresolved, "Branch target left unresolved");
                            plan.unresolved.push(unresolved);
                        }
                        rewritten
                    })
                    .collect();

                plan.updates.push(Request::UpdateNavigation {
                    item_id: item_id.to_string(),
                    options,
                    index: position,
                });
                plan
            },
        )
}
