//! Forms provider access

mod error;
mod google;
mod traits;

pub use error::ProviderError;
pub use google::GoogleFormsClient;
pub use traits::FormsProvider;

#[cfg(test)]
pub use traits::MockFormsProvider;
