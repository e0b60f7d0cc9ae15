use std::net::SocketAddr;
use std::sync::Arc;

use rostro_backend_sqlite::db;
use rostro_backend_sqlite::db::gallery::GalleryStore;
use rostro_backend_sqlite::extractor::FaceExtractor;
use rostro_backend_sqlite::media::FsMediaStore;
use rostro_backend_sqlite::utils::config::Config;
use rostro_backend_sqlite::utils::logging;
use rostro_backend_sqlite::{api, AppPaths, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cfg = Config::from_env();

    let data_dir = cfg.data.clone();
    let db_dir = data_dir.join("db");
    let uploads_dir = data_dir.join("uploads");
    let models_dir = data_dir.join("models");
    std::fs::create_dir_all(&db_dir)?;
    std::fs::create_dir_all(&uploads_dir)?;

    let db_path = db_dir.join("rostro.db");
    let conn = db::open_or_create(&db_path)?;
    let gallery = GalleryStore::new(conn);
    let media = Arc::new(FsMediaStore::new(uploads_dir.clone())?);

    #[cfg(feature = "facial-recognition")]
    let extractor: Arc<dyn FaceExtractor> = {
        let ex = Arc::new(rostro_backend_sqlite::extractor::OnnxExtractor::new(
            models_dir.clone(),
        ));
        // Model download can take a while; requests fail with a typed
        // extraction error until the sessions are up.
        let init = ex.clone();
        tokio::spawn(async move {
            if let Err(e) = init.initialize().await {
                tracing::error!("failed to initialize face extractor: {:#}", e);
            }
        });
        ex
    };
    #[cfg(not(feature = "facial-recognition"))]
    let extractor: Arc<dyn FaceExtractor> =
        Arc::new(rostro_backend_sqlite::extractor::DisabledExtractor);

    let paths = AppPaths {
        data: data_dir,
        db_path,
        uploads: uploads_dir,
        models: models_dir,
    };
    let state = Arc::new(AppState::new(cfg.clone(), paths, gallery, media, extractor));

    let app = api::routes::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
