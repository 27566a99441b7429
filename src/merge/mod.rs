//! Form merge: combine selected forms behind the introduction form and
//! re-route their branching in the merged result

mod error;
mod id_map;
mod navigation;
mod orchestrator;
mod requests;
mod sanitize;

pub use error::{MergeError, MergeStage};
pub use id_map::IdentifierMap;
pub use navigation::{has_navigation, plan_navigation, NavigationPlan, UnresolvedReason, UnresolvedTarget};
pub use orchestrator::{FormMerger, MergeOutcome, MergeRequest};
pub use requests::{assemble_sources, build_create_requests, Request, INTRO_OVERLAP};
pub use sanitize::sanitize_item;
