//! MongoDB variant store

use super::VariantStore;
use crate::config::VariantStoreConfig;
use crate::error::{EloadError, Result};
use async_trait::async_trait;
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::Client;
use std::time::Duration;
use tracing::debug;

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Variant store reached through the MongoDB driver
#[derive(Clone, Debug)]
pub struct MongoVariantStore {
    options: ClientOptions,
}

impl MongoVariantStore {
    pub fn new(config: &VariantStoreConfig) -> Self {
        let mut options = ClientOptions::default();
        options.hosts = vec![ServerAddress::Tcp {
            host: config.host.clone(),
            port: Some(config.port),
        }];
        options.app_name = Some("eload".to_string());
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        if let Some(user) = &config.user {
            let mut credential = Credential::default();
            credential.username = Some(user.clone());
            credential.password = config.password.clone();
            credential.source = Some(config.authentication_database.clone());
            options.credential = Some(credential);
        }
        Self { options }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }
}

/// Unreachable servers are retryable; refused credentials or commands are not
fn variant_error(err: mongodb::error::Error) -> EloadError {
    match *err.kind {
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. } => {
            EloadError::variant_store(err)
        }
        _ => EloadError::store("variant", err),
    }
}

#[async_trait]
impl VariantStore for MongoVariantStore {
    async fn database_names(&self) -> Result<Vec<String>> {
        let client = Client::with_options(self.options.clone()).map_err(variant_error)?;
        let names = client
            .list_database_names(None, None)
            .await
            .map_err(variant_error)?;
        debug!(count = names.len(), "Listed variant store databases");
        Ok(names)
    }
}
