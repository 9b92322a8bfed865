use std::sync::Arc;

use libxcast::config::ServerConfig;
use libxcast::{CredentialVault, Database, DeliveryClient, Importer, MediaLibrary, PostStore};

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone; the same handles are given to the embedded scheduler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub store: PostStore,
    pub importer: Importer,
    pub media: MediaLibrary,
    pub vault: Arc<CredentialVault>,
    /// Used for test posts sent straight from the dashboard
    pub delivery: Arc<dyn DeliveryClient>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        store: PostStore,
        media: MediaLibrary,
        vault: Arc<CredentialVault>,
        delivery: Arc<dyn DeliveryClient>,
        config: ServerConfig,
    ) -> Self {
        Self {
            db: store.database().clone(),
            importer: Importer::new(store.clone()),
            store,
            media,
            vault,
            delivery,
            config: Arc::new(config),
        }
    }
}
