use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::Json;

use crate::error::FaceError;
use crate::models::identity::UserList;
use crate::{workflow, AppState};

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

fn allowed_file(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| ALLOWED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct FormData {
    texts: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl FormData {
    async fn read(mut multipart: Multipart) -> Result<Self, FaceError> {
        let mut form = FormData::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| FaceError::Validation(format!("malformed multipart body: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| FaceError::Validation(format!("failed to read {}: {}", name, e)))?;
                    form.files.insert(name, Upload { filename, bytes: bytes.to_vec() });
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| FaceError::Validation(format!("failed to read {}: {}", name, e)))?;
                    form.texts.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    fn text(&self, name: &str) -> Result<&str, FaceError> {
        self.texts
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| FaceError::Validation(format!("missing form field '{}'", name)))
    }

    fn image(&self, name: &str) -> Result<&[u8], FaceError> {
        let upload = self
            .files
            .get(name)
            .ok_or_else(|| FaceError::Validation(format!("missing image field '{}'", name)))?;
        if upload.filename.is_empty() {
            return Err(FaceError::Validation(format!("no file selected for '{}'", name)));
        }
        if !allowed_file(&upload.filename) {
            return Err(FaceError::Validation(format!(
                "extension not allowed for '{}'; accepted: png, jpg, jpeg",
                upload.filename
            )));
        }
        if upload.bytes.is_empty() {
            return Err(FaceError::Validation(format!("empty upload for '{}'", name)));
        }
        Ok(&upload.bytes)
    }
}

pub async fn home() -> impl IntoResponse {
    Html(
        r#"<!doctype html>
<html><head><title>rostro</title></head><body>
<h1>Reconocimiento facial</h1>
<ul>
  <li><a href="/registrar">Registrar usuario</a></li>
  <li><a href="/reconocer">Reconocer usuario</a></li>
  <li><a href="/comparar">Comparar dos imágenes</a></li>
  <li><a href="/usuarios">Usuarios registrados</a></li>
</ul>
</body></html>"#,
    )
}

pub async fn health() -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "database": "SQLite",
    });
    (StatusCode::OK, Json(body))
}

pub async fn registrar_form() -> impl IntoResponse {
    Html(
        r#"<!doctype html>
<html><body>
<h1>Registrar usuario</h1>
<form method="post" enctype="multipart/form-data">
  <input type="text" name="nombre" placeholder="Nombre" required>
  <input type="file" name="imagen" accept=".png,.jpg,.jpeg" required>
  <button type="submit">Registrar</button>
</form>
</body></html>"#,
    )
}

pub async fn registrar(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, FaceError> {
    let form = FormData::read(multipart).await?;
    let nombre = form.text("nombre")?.to_string();
    let image = form.image("imagen")?.to_vec();

    let outcome = workflow::enroll(&state, &nombre, image).await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "message": format!("Usuario {} registrado correctamente.", outcome.name),
        "nombre": outcome.name,
        "image_url": outcome.image_url,
    })))
}

pub async fn reconocer_form() -> impl IntoResponse {
    Html(
        r#"<!doctype html>
<html><body>
<h1>Reconocer usuario</h1>
<form method="post" enctype="multipart/form-data">
  <input type="file" name="imagen" accept=".png,.jpg,.jpeg" required>
  <button type="submit">Reconocer</button>
</form>
</body></html>"#,
    )
}

pub async fn reconocer(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, FaceError> {
    let form = FormData::read(multipart).await?;
    let image = form.image("imagen")?.to_vec();

    match workflow::verify(&state, image).await? {
        Some(outcome) => Ok(Json(serde_json::json!({
            "status": "ok",
            "recognized": true,
            "nombre": outcome.name,
            "distance": outcome.distance,
            "message": format!("Usuario reconocido: {}", outcome.name),
        }))),
        None => Ok(Json(serde_json::json!({
            "status": "ok",
            "recognized": false,
            "message": "Usuario no reconocido.",
        }))),
    }
}

pub async fn comparar_form() -> impl IntoResponse {
    Html(
        r#"<!doctype html>
<html><body>
<h1>Comparar dos imágenes</h1>
<form method="post" enctype="multipart/form-data">
  <input type="file" name="imagen1" accept=".png,.jpg,.jpeg" required>
  <input type="file" name="imagen2" accept=".png,.jpg,.jpeg" required>
  <button type="submit">Comparar</button>
</form>
</body></html>"#,
    )
}

pub async fn comparar(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, FaceError> {
    let form = FormData::read(multipart).await?;
    let image1 = form.image("imagen1")?.to_vec();
    let image2 = form.image("imagen2")?.to_vec();

    let outcome = workflow::compare(&state, image1, image2).await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "distance": outcome.distance,
        "same_person": outcome.same_person,
    })))
}

pub async fn usuarios(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, FaceError> {
    let gallery = state.gallery.clone();
    let names = tokio::task::spawn_blocking(move || gallery.list_names())
        .await
        .map_err(|e| FaceError::Storage(format!("gallery task failed: {}", e)))??;
    Ok(Json(UserList { usuarios: names }))
}

pub async fn eliminar(
    State(state): State<Arc<AppState>>,
    Path(nombre): Path<String>,
) -> Result<impl IntoResponse, FaceError> {
    workflow::remove(&state, &nombre).await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "message": format!("Usuario '{}' eliminado correctamente.", nombre),
    })))
}
