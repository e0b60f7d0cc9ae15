#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rostro_backend_sqlite::db;
use rostro_backend_sqlite::db::gallery::GalleryStore;
use rostro_backend_sqlite::error::FaceError;
use rostro_backend_sqlite::extractor::FaceExtractor;
use rostro_backend_sqlite::media::FsMediaStore;
use rostro_backend_sqlite::utils::config::Config;
use rostro_backend_sqlite::{api, AppPaths, AppState};
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};

/// Deterministic extractor: the embedding is a pure function of the image
/// bytes, so identical uploads sit at distance zero and distinct fixtures sit
/// far apart.
pub struct StubExtractor {
    pub dim: usize,
}

impl StubExtractor {
    pub fn embedding_for(&self, image: &[u8]) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for (i, b) in image.iter().enumerate() {
            v[i % self.dim] += *b as f32 / 255.0;
        }
        v
    }
}

impl FaceExtractor for StubExtractor {
    fn extract(&self, image: &[u8]) -> Result<Vec<f32>, FaceError> {
        if image.is_empty() {
            return Err(FaceError::ExtractionFailed("no face detected".into()));
        }
        Ok(self.embedding_for(image))
    }
}

/// Always fails, as if no face were ever found.
pub struct FailingExtractor;

impl FaceExtractor for FailingExtractor {
    fn extract(&self, _image: &[u8]) -> Result<Vec<f32>, FaceError> {
        Err(FaceError::ExtractionFailed("no face detected".into()))
    }
}

/// Blocks long enough to trip a short extraction deadline.
pub struct SlowExtractor {
    pub delay: Duration,
}

impl FaceExtractor for SlowExtractor {
    fn extract(&self, _image: &[u8]) -> Result<Vec<f32>, FaceError> {
        std::thread::sleep(self.delay);
        Ok(vec![1.0, 2.0, 3.0])
    }
}

pub fn setup_test_db(tmp: &TempDir) -> (PathBuf, rusqlite::Connection) {
    let db_dir = tmp.path().join("db");
    std::fs::create_dir_all(&db_dir).unwrap();
    let db_path = db_dir.join("rostro.db");
    let conn = db::open_or_create(&db_path).unwrap();
    (db_path, conn)
}

pub fn test_config(data: PathBuf) -> Config {
    Config {
        data,
        port: 0,
        match_threshold: 0.7,
        extract_timeout: Duration::from_secs(5),
        storage_timeout: Duration::from_secs(5),
    }
}

pub fn create_test_app_state(
    tmp: &TempDir,
    cfg: Config,
    extractor: Arc<dyn FaceExtractor>,
) -> Arc<AppState> {
    let (db_path, conn) = setup_test_db(tmp);
    let uploads = tmp.path().join("uploads");
    let models = tmp.path().join("models");
    let gallery = GalleryStore::new(conn);
    let media = Arc::new(FsMediaStore::new(uploads.clone()).unwrap());
    let paths = AppPaths {
        data: tmp.path().to_path_buf(),
        db_path,
        uploads,
        models,
    };
    Arc::new(AppState::new(cfg, paths, gallery, media, extractor))
}

pub async fn spawn_server(state: Arc<AppState>) -> u16 {
    let app = api::routes::router(state);
    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = TcpListener::bind(&addr).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    wait_for_port(port).await;
    port
}

pub async fn wait_for_port(port: u16) {
    for _ in 0..30 {
        if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("server never started");
}

/// Minimal valid JPEG (1x1 pixel)
pub fn jpeg_bytes() -> Vec<u8> {
    use base64::{engine::general_purpose, Engine as _};
    general_purpose::STANDARD.decode("/9j/4AAQSkZJRgABAQAAAQABAAD/2wBDAP//////////////////////////////////////////////////////////////////////////////////////2wBDAf//////////////////////////////////////////////////////////////////////////////////////wAARCABkAGQDAREAAhEBAxEB/8QAFQABAQAAAAAAAAAAAAAAAAAAAAb/xAAUEAEAAAAAAAAAAAAAAAAAAAAA/8QAFQEBAQAAAAAAAAAAAAAAAAAAAgP/xAAUEQEAAAAAAAAAAAAAAAAAAAAA/9oADAMBAAIRAxEAPwB3AAAAAP/Z").unwrap()
}

/// Minimal valid PNG (1x1 pixel)
pub fn png_bytes() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
        0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1 dimensions
        0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE,
        0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, // IDAT chunk
        0x08, 0x99, 0x01, 0x01, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x02,
        0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ]
}

/// Helper to make HTTP requests to a test server
pub struct TestClient {
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestClient {
    pub fn new(port: u16) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
        }
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap()
    }

    pub async fn post_form(&self, path: &str, form: reqwest::multipart::Form) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    pub async fn post_empty(&self, path: &str) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap()
    }
}

pub fn image_part(bytes: Vec<u8>, filename: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string())
}

pub fn enroll_form(nombre: &str, bytes: Vec<u8>, filename: &str) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .text("nombre", nombre.to_string())
        .part("imagen", image_part(bytes, filename))
}

pub fn recognize_form(bytes: Vec<u8>, filename: &str) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new().part("imagen", image_part(bytes, filename))
}
