//! SMP Registry Server Binary
//!
//! Runs the admin HTTP API together with the background tasks for audit
//! retention and certificate activation.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use smp_core::DataEncryptor;
use smp_network::{MockDirectory, MockLocator, NetworkServices};
use smp_server::admin::certificates::spawn_rotation_task;
use smp_server::audit::spawn_retention_task;
use smp_server::{
    create_router, AppState, MemoryStore, RegistrationOrchestrator, RegistryStore, ServerAdmin, ServerSettings,
    StoreAuditSink,
};

#[tokio::main]
async fn main() {
    let settings = ServerSettings::from_env().expect("Invalid server configuration");

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let store = open_store(&settings).await;
    let encryptor =
        DataEncryptor::new(settings.master_key.as_bytes()).expect("SMP_MASTER_KEY must not be empty");

    // Network services
    let network = match &settings.dev_network {
        Some(dev) => {
            warn!("Using in-memory development network services");
            NetworkServices::none()
                .with_locator(Arc::new(
                    MockLocator::new()
                        .requiring_smp_registration(dev.locator_requires_smp_registration)
                        .requiring_cert_registration(dev.locator_requires_cert_registration),
                ))
                .with_directory(Arc::new(
                    MockDirectory::new().requiring_sml_registration(dev.directory_requires_sml),
                ))
        }
        None => NetworkServices::none(),
    };

    let audit = Arc::new(StoreAuditSink::new(store.clone()));
    let orchestrator = RegistrationOrchestrator::new(store.clone(), network.clone(), audit.clone());
    let admin = ServerAdmin::new(store.clone(), network, audit, encryptor);

    // Background tasks
    spawn_retention_task(store.clone(), settings.audit_retention_days);
    spawn_rotation_task(admin.clone(), Duration::from_secs(settings.rotation_check_secs));

    info!(
        port = settings.port,
        persistent = settings.database_url.is_some(),
        "Starting SMP registry server"
    );

    let state = Arc::new(AppState { orchestrator, admin });
    let app = create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %addr, "SMP registry listening");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}

#[cfg(feature = "postgres")]
async fn open_store(settings: &ServerSettings) -> Arc<dyn RegistryStore> {
    match &settings.database_url {
        Some(url) => Arc::new(
            smp_server::PostgresStore::new(url)
                .await
                .expect("Failed to connect to database"),
        ),
        None => Arc::new(MemoryStore::new()),
    }
}

#[cfg(not(feature = "postgres"))]
async fn open_store(settings: &ServerSettings) -> Arc<dyn RegistryStore> {
    if settings.database_url.is_some() {
        warn!("SMP_DATABASE_URL is set but the server was built without the postgres feature");
    }
    Arc::new(MemoryStore::new())
}
