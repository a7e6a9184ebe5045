use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::helpers::provider_seed_from_env;
use crate::host::{DetachedHost, HostBridge, HttpHostBridge};
use crate::llm::{HttpTransport, ProviderClient, ProviderConfig, Transport};
use crate::notify::{NotificationDispatcher, ToastBoard};
use crate::storage::{FileMedium, MediumError, MemoryMedium, PersistentStore, StorageKey, StorageMedium, StoreError};
use crate::task::{ModuleKind, TaskOrchestrator};

const SHARED_NAMESPACE: &str = "shared";

/// Everything the API needs: one orchestrator and store per module over a
/// single storage medium, plus the shared provider client and toast board.
pub struct Runtime {
    pub config: AppConfig,
    pub toasts: Arc<ToastBoard>,
    shared: Arc<PersistentStore>,
    orchestrators: HashMap<ModuleKind, TaskOrchestrator>,
}

impl Runtime {
    pub fn build(config: AppConfig) -> Result<Self, MediumError> {
        let medium: Arc<dyn StorageMedium> = match &config.data_dir {
            Some(dir) => Arc::new(FileMedium::open(dir, config.storage_quota)?),
            None => Arc::new(MemoryMedium::new(config.storage_quota)),
        };
        let host: Arc<dyn HostBridge> = match &config.host_url {
            Some(url) => Arc::new(HttpHostBridge::new(url)),
            None => Arc::new(DetachedHost),
        };
        let runtime = Self::with_parts(config, medium, host, Arc::new(HttpTransport::new()));
        if let Some(seed) = provider_seed_from_env() {
            runtime.seed_provider_config(seed);
        }
        Ok(runtime)
    }

    pub fn with_parts(
        config: AppConfig,
        medium: Arc<dyn StorageMedium>,
        host: Arc<dyn HostBridge>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let client = Arc::new(ProviderClient::standard(host.clone(), transport));
        let toasts = Arc::new(ToastBoard::default());
        let notifier = Arc::new(NotificationDispatcher::standard(host.clone(), toasts.clone()));
        let settings = config.orchestrator_settings();

        let orchestrators = ModuleKind::ALL
            .iter()
            .map(|module| {
                let store = Arc::new(PersistentStore::new(module.as_str(), medium.clone()));
                let orch = TaskOrchestrator::new(
                    *module,
                    client.clone(),
                    store,
                    host.clone(),
                    notifier.clone(),
                    settings.clone(),
                );
                (*module, orch)
            })
            .collect();

        info!(
            strategies = ?client.strategy_names(),
            persistent = config.data_dir.is_some(),
            "runtime ready"
        );
        Self {
            config,
            toasts,
            shared: Arc::new(PersistentStore::new(SHARED_NAMESPACE, medium)),
            orchestrators,
        }
    }

    pub fn orchestrator(&self, module: ModuleKind) -> Option<&TaskOrchestrator> {
        self.orchestrators.get(&module)
    }

    pub fn provider_config(&self) -> ProviderConfig {
        self.shared.provider_config()
    }

    pub fn set_provider_config(&self, cfg: ProviderConfig) -> Result<ProviderConfig, StoreError> {
        let cfg = cfg.sanitized();
        self.shared.set_provider_config(&cfg)?;
        Ok(cfg)
    }

    /// Stores `seed` unless a provider config was saved before.
    pub fn seed_provider_config(&self, seed: ProviderConfig) {
        if self
            .shared
            .get_opt::<ProviderConfig>(&StorageKey::ApiConfig)
            .is_some()
        {
            return;
        }
        match self.set_provider_config(seed) {
            Ok(cfg) => info!(kind = ?cfg.kind, "provider config seeded from environment"),
            Err(err) => warn!(error = %err, "could not seed provider config"),
        }
    }
}
