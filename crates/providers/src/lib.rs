//! Completion transports for toolrelay.
//!
//! All providers implement the `toolrelay_core::Provider` trait.
//! [`build_from_config`] picks the right one for an [`AppConfig`].

pub mod openai_compat;
pub mod sse;

use std::sync::Arc;

use toolrelay_config::{AppConfig, ProviderKind};
use toolrelay_core::error::ProviderError;
use toolrelay_core::provider::Provider;

pub use openai_compat::OpenAiCompatProvider;

/// Build the configured provider.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key.clone().unwrap_or_default();

    let provider = match config.provider {
        ProviderKind::OpenAi => match &config.api_url {
            Some(url) => OpenAiCompatProvider::new("openai", url, api_key)?,
            None => OpenAiCompatProvider::openai(api_key)?,
        },
        ProviderKind::Azure => {
            let endpoint = config.api_url.as_deref().ok_or_else(|| {
                ProviderError::NotConfigured("azure provider needs api_url".into())
            })?;
            OpenAiCompatProvider::azure(endpoint, &config.api_version, api_key)?
        }
        ProviderKind::Custom => {
            let url = config.api_url.as_deref().ok_or_else(|| {
                ProviderError::NotConfigured("custom provider needs api_url".into())
            })?;
            OpenAiCompatProvider::new("custom", url, api_key)?
        }
    };

    Ok(Arc::new(provider))
}
