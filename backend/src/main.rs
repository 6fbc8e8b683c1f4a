use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;

use diesel_async::AsyncConnection;

const MIGRATIONS: diesel_async_migrations::EmbeddedMigrations =
    diesel_async_migrations::embed_migrations!("../migrations/");

async fn run_migrations(connection: &mut diesel_async::AsyncPgConnection) {
    MIGRATIONS.run_pending_migrations(connection).await.unwrap();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let registry = tracing_subscriber::Registry::default()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::filter_fn(|meta| {
            meta.target().contains("backend")
        }));
    tracing::subscriber::set_global_default(registry).unwrap();

    tracing::info!("Starting...");

    let config = backend::config::ServerConfig::from_env();

    tracing::info!("Applying Migrations");
    {
        let mut connection = diesel_async::AsyncPgConnection::establish(&config.database_url)
            .await
            .unwrap_or_else(|e| panic!("Error connecting to database - {:?}", e));
        run_migrations(&mut connection).await;
    }
    tracing::info!("Completed Migrations");

    let pool = backend::db_pool(&config.database_url);

    let storage = config.demos.as_ref().map(|demos| build_storage(demos));

    let (deletions, deletion_rx) = backend::deletion::DeletionQueue::new(64);
    if let (Some(storage), Some(demos)) = (storage.as_ref(), config.demos.as_ref()) {
        tokio::task::spawn(backend::deletion::run_consumer(
            deletion_rx,
            storage.duplicate(),
            demos.pathway.clone(),
        ));
    }

    let steam = config.steam_api_key.clone().map(|api_key| backend::SteamState {
        openid: steam_openid::SteamOpenId::new(&config.public_url, "/api/steam/callback")
            .unwrap(),
        api_key,
    });

    let session_store = backend::diesel_sessionstore::DieselStore::new(pool.clone());
    let session_layer = tower_sessions::SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_expiry(tower_sessions::Expiry::OnInactivity(
            time::Duration::hours(48),
        ));

    let bind_addr = config.bind_addr;
    let services = std::sync::Arc::new(backend::Services {
        db: pool,
        storage,
        deletions,
        steam,
        config,
    });

    let router = axum::Router::new()
        .nest("/api/", backend::api::router(services))
        .layer(session_layer)
        .nest_service("/", tower_http::services::ServeDir::new("static/"));

    let listener = tokio::net::TcpListener::bind(bind_addr).await.unwrap();
    axum::serve(listener, router).await.unwrap();
}

fn build_storage(config: &backend::config::DemoConfig) -> Box<dyn backend::storage::DemoStorage> {
    match &config.backend {
        backend::config::DemoBackend::S3 {
            bucket,
            region,
            endpoint,
        } => {
            let region = match endpoint {
                Some(endpoint) => s3::Region::Custom {
                    region: region.clone(),
                    endpoint: endpoint.clone(),
                },
                None => region.parse().unwrap(),
            };
            let credentials = s3::creds::Credentials::default().unwrap();

            Box::new(backend::storage::S3Storage::new(bucket, region, credentials))
        }
        backend::config::DemoBackend::File { folder } => {
            Box::new(backend::storage::FileStorage::new(folder.clone()))
        }
    }
}
