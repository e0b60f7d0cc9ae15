use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::FaceError;
use crate::extractor::FaceExtractor;

// Model URLs
const SCRFD_MODEL_URL_HF: &str = "https://huggingface.co/ykk648/face_lib/resolve/main/face_detect/scrfd_onnx/scrfd_500m_bnkps.onnx";
const SCRFD_MODEL_URL_GH: &str = "https://github.com/deepinsight/insightface/releases/download/v0.7/scrfd_500m_bnkps.onnx";
const ARCFACE_MODEL_URL: &str = "https://huggingface.co/maze/faceX/resolve/e010b5098c3685fd00b22dd2aec6f37320e3d850/w600k_r50.onnx";

const SCRFD_INPUT_SIZE: u32 = 640;
const ARCFACE_INPUT_SIZE: u32 = 112;

fn detection_confidence_threshold() -> f32 {
    std::env::var("ROSTRO_FACE_CONFIDENCE_THRESHOLD")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.5)
}

fn nms_iou_threshold() -> f32 {
    std::env::var("ROSTRO_FACE_NMS_IOU_THRESHOLD")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.4)
}

#[derive(Debug, Clone)]
struct FaceBbox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
}

/// SCRFD face detection + ArcFace embedding via ONNX Runtime.
///
/// Sessions load lazily through `initialize`; until then every `extract`
/// fails with a model-not-loaded message. Session slots use interior
/// mutability so the extractor can be shared as `Arc<dyn FaceExtractor>`
/// while `initialize` runs in the background.
pub struct OnnxExtractor {
    models_dir: PathBuf,
    detect_session: Mutex<Option<Session>>,
    embed_session: Mutex<Option<Session>>,
}

impl OnnxExtractor {
    pub fn new(models_dir: PathBuf) -> Self {
        Self {
            models_dir,
            detect_session: Mutex::new(None),
            embed_session: Mutex::new(None),
        }
    }

    pub fn models_loaded(&self) -> bool {
        self.detect_session.lock().is_some() && self.embed_session.lock().is_some()
    }

    pub async fn initialize(&self) -> Result<()> {
        std::fs::create_dir_all(&self.models_dir).context("failed to create models directory")?;

        let auto_dl = std::env::var("ROSTRO_FACE_AUTO_DOWNLOAD")
            .map(|v| !matches!(v.as_str(), "0" | "false" | "FALSE"))
            .unwrap_or(true);
        if auto_dl {
            if let Err(e) = self.download_models().await {
                warn!("face model auto-download failed: {}", e);
            }
        } else {
            info!("face model auto-download disabled by user");
        }

        if let Err(e) = self.load_models() {
            warn!("face models not loaded: {}", e);
        }
        Ok(())
    }

    async fn download_models(&self) -> Result<()> {
        let scrfd_path = self.models_dir.join("scrfd_500m_bnkps.onnx");
        let arcface_path = self.models_dir.join("w600k_r50.onnx");
        let client = self.create_http_client()?;

        if !scrfd_path.exists() {
            info!("downloading SCRFD face detection model...");
            if let Err(e) = self.download_file(&client, SCRFD_MODEL_URL_HF, &scrfd_path).await {
                warn!("failed to download from Hugging Face: {}. Trying GitHub...", e);
                self.download_file(&client, SCRFD_MODEL_URL_GH, &scrfd_path).await?;
            }
        }

        if !arcface_path.exists() {
            info!("downloading ArcFace recognition model (w600k_r50.onnx)...");
            self.download_file(&client, ARCFACE_MODEL_URL, &arcface_path).await?;
        }

        Ok(())
    }

    fn create_http_client(&self) -> Result<reqwest::Client> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(token) = std::env::var("HF_TOKEN") {
            if !token.is_empty() {
                info!("using Hugging Face token for model download");
                headers.insert(
                    reqwest::header::AUTHORIZATION,
                    reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))?,
                );
            }
        }
        reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to create HTTP client")
    }

    async fn download_file(&self, client: &reqwest::Client, url: &str, path: &Path) -> Result<()> {
        let response = client
            .get(url)
            .send()
            .await
            .context(format!("failed to download model from {}", url))?;
        if !response.status().is_success() {
            anyhow::bail!("failed to download model: HTTP {}", response.status());
        }
        let bytes = response.bytes().await.context("failed to read response body")?;
        std::fs::write(path, &bytes).context(format!("failed to write file: {:?}", path))?;

        // ONNX files are at least a few KB; anything smaller is an error page.
        if bytes.len() < 1024 {
            anyhow::bail!(
                "downloaded file is suspiciously small ({} bytes), may be corrupted",
                bytes.len()
            );
        }

        info!("downloaded model to {:?} ({} bytes)", path, bytes.len());
        Ok(())
    }

    fn load_models(&self) -> Result<()> {
        let scrfd_path = self.models_dir.join("scrfd_500m_bnkps.onnx");
        let arcface_path = self.models_dir.join("w600k_r50.onnx");

        if !scrfd_path.exists() || !arcface_path.exists() {
            anyhow::bail!(
                "face models missing; expected SCRFD at {:?} and ArcFace at {:?}",
                scrfd_path,
                arcface_path
            );
        }

        let detect = Session::builder()?
            .commit_from_file(&scrfd_path)
            .context("failed to create SCRFD session")?;
        let embed = Session::builder()?
            .commit_from_file(&arcface_path)
            .context("failed to create ArcFace session")?;

        *self.detect_session.lock() = Some(detect);
        *self.embed_session.lock() = Some(embed);
        info!("face models loaded: SCRFD={:?} ArcFace={:?}", scrfd_path, arcface_path);
        Ok(())
    }

    // Letterbox to 640x640 NCHW, BGR channel order, normalized to [-1, 1].
    fn preprocess_detect(&self, image: &DynamicImage) -> (Vec<f32>, f32) {
        let side = SCRFD_INPUT_SIZE;
        let (ow, oh) = (image.width() as f32, image.height() as f32);
        let scale = side as f32 / ow.max(oh);
        let nw = (ow * scale) as u32;
        let nh = (oh * scale) as u32;
        let resized = image.resize_exact(nw, nh, image::imageops::FilterType::Triangle);
        let mut padded = image::DynamicImage::new_rgb8(side, side);
        image::imageops::overlay(&mut padded, &resized, 0, 0);
        let rgb = padded.to_rgb8();
        let mut data = Vec::with_capacity(3 * (side * side) as usize);
        for c in 0..3 {
            for y in 0..side {
                for x in 0..side {
                    let p = rgb.get_pixel(x, y);
                    // InsightFace models expect BGR
                    let v = match c {
                        0 => p[2],
                        1 => p[1],
                        _ => p[0],
                    } as f32;
                    data.push((v - 127.5) / 128.0);
                }
            }
        }
        (data, scale)
    }

    fn preprocess_embed(&self, face_crop: &DynamicImage) -> Vec<f32> {
        let side = ARCFACE_INPUT_SIZE;
        let resized = face_crop.resize_exact(side, side, image::imageops::FilterType::Triangle);
        let rgb = resized.to_rgb8();
        let mut data = Vec::with_capacity(3 * (side * side) as usize);
        for c in 0..3 {
            for y in 0..side {
                for x in 0..side {
                    let p = rgb.get_pixel(x, y);
                    let v = match c {
                        0 => p[0],
                        1 => p[1],
                        _ => p[2],
                    } as f32;
                    data.push((v - 127.5) / 128.0);
                }
            }
        }
        data
    }

    fn detect_faces(&self, image: &DynamicImage) -> Result<Vec<FaceBbox>> {
        let mut guard = self.detect_session.lock();
        let session = guard.as_mut().context("detection model not loaded")?;

        let (data, scale) = self.preprocess_detect(image);
        let img_w = image.width() as f32;
        let img_h = image.height() as f32;
        let side = SCRFD_INPUT_SIZE as f32;

        let input_name = session.inputs[0].name.clone();
        let shape = vec![1i64, 3, SCRFD_INPUT_SIZE as i64, SCRFD_INPUT_SIZE as i64];
        let input = Value::from_array((shape, data)).context("failed to create SCRFD input tensor")?;
        let outputs = session
            .run(ort::inputs![input_name => input])
            .context("SCRFD inference failed")?;

        let confidence_threshold = detection_confidence_threshold();
        let mut raw: Vec<FaceBbox> = Vec::new();

        // SCRFD emits one (score, bbox) pair per anchor at strides 8/16/32.
        // Boxes come as distances from the grid point, in stride units.
        for stride_str in ["8", "16", "32"] {
            let stride: f32 = stride_str.parse().expect("static stride literal");
            let (Some(sv), Some(bv)) = (
                outputs.get(&format!("score_{}", stride_str)),
                outputs.get(&format!("bbox_{}", stride_str)),
            ) else {
                continue;
            };
            let (Ok((_, scores)), Ok((_, boxes))) =
                (sv.try_extract_tensor::<f32>(), bv.try_extract_tensor::<f32>())
            else {
                continue;
            };

            let width = (side / stride) as usize;
            let grid_points = width * width;
            if grid_points == 0 || scores.len() % grid_points != 0 {
                warn!(
                    "SCRFD stride {}: {} scores do not tile a {}x{} grid",
                    stride, scores.len(), width, width
                );
                continue;
            }
            let anchors_per_point = scores.len() / grid_points;

            for i in 0..grid_points {
                let cy = (i / width) as f32 * stride;
                let cx = (i % width) as f32 * stride;
                for a in 0..anchors_per_point {
                    let idx = i * anchors_per_point + a;
                    let conf = scores[idx];
                    if conf < confidence_threshold {
                        continue;
                    }
                    let b = idx * 4;
                    if b + 3 >= boxes.len() {
                        continue;
                    }
                    let l = boxes[b] * stride;
                    let t = boxes[b + 1] * stride;
                    let r = boxes[b + 2] * stride;
                    let d = boxes[b + 3] * stride;

                    let x1 = ((cx - l) / scale).clamp(0.0, img_w);
                    let y1 = ((cy - t) / scale).clamp(0.0, img_h);
                    let x2 = ((cx + r) / scale).clamp(0.0, img_w);
                    let y2 = ((cy + d) / scale).clamp(0.0, img_h);

                    if x2 <= x1 || y2 <= y1 || (x2 - x1) < 8.0 || (y2 - y1) < 8.0 {
                        continue;
                    }
                    raw.push(FaceBbox { x1, y1, x2, y2, confidence: conf });
                }
            }
        }

        let keep = nms(&raw, nms_iou_threshold());
        let out: Vec<FaceBbox> = keep.into_iter().map(|i| raw[i].clone()).collect();
        tracing::debug!("detected {} faces after NMS", out.len());
        Ok(out)
    }

    fn embed_face(&self, face_crop: &DynamicImage) -> Result<Vec<f32>> {
        let mut guard = self.embed_session.lock();
        let session = guard.as_mut().context("recognition model not loaded")?;

        let data = self.preprocess_embed(face_crop);
        let input_name = session.inputs[0].name.clone();
        let shape = vec![1i64, 3, ARCFACE_INPUT_SIZE as i64, ARCFACE_INPUT_SIZE as i64];
        let input = Value::from_array((shape, data)).context("failed to create ArcFace input tensor")?;
        let outputs = session
            .run(ort::inputs![input_name => input])
            .context("ArcFace inference failed")?;

        let key = outputs
            .keys()
            .find(|k| ["output", "embedding", "fc1", "features"].contains(k))
            .or_else(|| outputs.keys().next())
            .context("ArcFace model produced no outputs")?
            .to_string();
        let val = outputs.get(&key).context("ArcFace output missing")?;
        let (_, slice) = val
            .try_extract_tensor::<f32>()
            .context("failed to extract ArcFace output tensor")?;

        let mut v = slice.to_vec();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            anyhow::bail!("ArcFace embedding has zero norm");
        }
        for x in &mut v {
            *x /= norm;
        }
        Ok(v)
    }
}

impl FaceExtractor for OnnxExtractor {
    fn extract(&self, image: &[u8]) -> Result<Vec<f32>, FaceError> {
        let img = image::load_from_memory(image)
            .map_err(|e| FaceError::ExtractionFailed(format!("unreadable image: {}", e)))?;
        let faces = self
            .detect_faces(&img)
            .map_err(|e| FaceError::ExtractionFailed(e.to_string()))?;
        let bbox = match faces.len() {
            0 => return Err(FaceError::ExtractionFailed("no face detected".into())),
            1 => &faces[0],
            n => {
                return Err(FaceError::ExtractionFailed(format!(
                    "{} faces detected, expected exactly one",
                    n
                )))
            }
        };

        let x1 = bbox.x1.max(0.0) as u32;
        let y1 = bbox.y1.max(0.0) as u32;
        let x2 = bbox.x2.min(img.width() as f32) as u32;
        let y2 = bbox.y2.min(img.height() as f32) as u32;
        if x2 <= x1 || y2 <= y1 {
            return Err(FaceError::ExtractionFailed("degenerate face bounding box".into()));
        }
        let crop = img.crop_imm(x1, y1, x2 - x1, y2 - y1);
        self.embed_face(&crop)
            .map_err(|e| FaceError::ExtractionFailed(e.to_string()))
    }
}

fn nms(boxes: &[FaceBbox], iou_threshold: f32) -> Vec<usize> {
    if boxes.is_empty() {
        return vec![];
    }
    let mut indices: Vec<usize> = (0..boxes.len()).collect();
    indices.sort_by(|&a, &b| {
        boxes[b]
            .confidence
            .partial_cmp(&boxes[a].confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];
    for i in 0..indices.len() {
        let ia = indices[i];
        if suppressed[ia] {
            continue;
        }
        keep.push(ia);
        for &ib in indices.iter().skip(i + 1) {
            if suppressed[ib] {
                continue;
            }
            if iou(&boxes[ia], &boxes[ib]) > iou_threshold {
                suppressed[ib] = true;
            }
        }
    }
    keep
}

fn iou(a: &FaceBbox, b: &FaceBbox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);
    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }
    let intersection = (x2 - x1) * (y2 - y1);
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}
