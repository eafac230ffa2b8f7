use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use socketioxide::extract::SocketRef;
use socketioxide::SocketIo;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use heartline_api::config::{AppConfig, PhotoBackend, RealtimeBroker, StoreBackend};
use heartline_api::realtime::{
    self, FanoutHealth, MessageFanout, RedisFanout, RelayBackoff, RelayStatus, SocketIoFanout,
};
use heartline_api::storage::{DiskStorage, MinioStorage, PhotoStorage};
use heartline_api::store::{MemoryStore, PgStore, Store};
use heartline_api::{routes, AppState};
use heartline_shared::clients::{create_pool, MinioClient, RedisClient};
use heartline_shared::middleware::{init_metrics, init_tracing, metrics_middleware, TokenVerifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("heartline-api");

    let config = AppConfig::load()?;
    let port = config.port;
    let metrics_handle = init_metrics()?;

    let store: Arc<dyn Store> = match config.store {
        StoreBackend::Postgres => {
            let pool = create_pool(&config.database_url, config.db_pool_size)?;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let photos: Arc<dyn PhotoStorage> = match config.photo_storage {
        PhotoBackend::Disk => Arc::new(DiskStorage::new(&config.upload_dir)),
        PhotoBackend::Minio => {
            let minio = MinioClient::new(
                &config.minio_endpoint,
                &config.minio_access_key,
                &config.minio_secret_key,
                &config.minio_bucket,
                &config.minio_public_url,
            )
            .await;
            Arc::new(MinioStorage::new(minio))
        }
    };

    let mut verifier = TokenVerifier::new(
        config.jwt_secret.clone(),
        config.jwt_issuer.clone(),
        config.jwt_ttl_secs,
    );
    if let Some(url) = &config.jwks_url {
        let jwks = TokenVerifier::fetch_jwks(url).await?;
        verifier = verifier.with_jwks(jwks);
    }

    let (sio_layer, io) = SocketIo::builder().build_layer();

    let (fanout, fanout_health): (Arc<dyn MessageFanout>, Option<Arc<dyn FanoutHealth>>) = match config.realtime {
        RealtimeBroker::Local => (Arc::new(SocketIoFanout::new(io.clone())) as Arc<dyn MessageFanout>, None),
        RealtimeBroker::Redis => {
            let redis = RedisClient::connect(&config.redis_url).await?;
            let relay = RelayStatus::default();
            realtime::spawn_relay(
                redis.clone(),
                config.fanout_channel.clone(),
                io.clone(),
                relay.clone(),
                RelayBackoff::default(),
            );
            let fanout = Arc::new(RedisFanout::new(redis, config.fanout_channel.clone(), relay));
            let health: Arc<dyn FanoutHealth> = fanout.clone();
            (fanout as Arc<dyn MessageFanout>, Some(health))
        }
    };

    let state = Arc::new(AppState {
        config,
        store,
        photos,
        fanout,
        fanout_health,
        verifier,
    });

    io.ns("/", {
        let state = state.clone();
        move |socket: SocketRef| {
            let state = state.clone();
            async move {
                realtime::socket::on_connect(socket, state).await;
            }
        }
    });

    let app = routes::router(state)
        .route("/metrics", get(move || async move { metrics_handle.render() }))
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(sio_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "heartline-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
