//! Form resource model

mod model;

pub use model::*;
