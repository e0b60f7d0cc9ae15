#[cfg(feature = "facial-recognition")]
pub mod onnx;
#[cfg(feature = "facial-recognition")]
pub use onnx::OnnxExtractor;

use crate::error::FaceError;

/// Embedding extractor contract.
///
/// Given raw image bytes, produce the embedding of the single face in the
/// picture, or fail with `ExtractionFailed` when no face is found, more than
/// one face is found, or the model errors internally. Implementations are
/// blocking; callers run them on a blocking thread with a deadline.
pub trait FaceExtractor: Send + Sync {
    fn extract(&self, image: &[u8]) -> Result<Vec<f32>, FaceError>;
}

/// Stand-in used when the binary is built without the facial-recognition
/// feature: every request fails cleanly instead of the process refusing to
/// start.
pub struct DisabledExtractor;

impl FaceExtractor for DisabledExtractor {
    fn extract(&self, _image: &[u8]) -> Result<Vec<f32>, FaceError> {
        Err(FaceError::ExtractionFailed(
            "recognition models unavailable in this build".into(),
        ))
    }
}
