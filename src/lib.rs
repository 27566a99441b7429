//! form-merge - combine Google Forms into one form
//!
//! Selected forms are appended behind a fixed introduction form, created as
//! fresh items in a copy of an empty template, and their branching options
//! are re-pointed at the merged items.

pub mod config;
pub mod forms;
pub mod merge;
pub mod provider;
