use crate::{AutomationError, ScreenshotResult};

/// Outcome of a recognition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    /// No OCR engine on this machine.
    Unavailable,
    Text(String),
}

#[async_trait::async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &ScreenshotResult) -> Result<Recognition, AutomationError>;
}

/// Recognizer used when OCR is disabled or unsupported.
#[derive(Debug, Default)]
pub struct NoOcr;

#[async_trait::async_trait]
impl TextRecognizer for NoOcr {
    async fn recognize(&self, _image: &ScreenshotResult) -> Result<Recognition, AutomationError> {
        Ok(Recognition::Unavailable)
    }
}

#[cfg(target_os = "windows")]
pub use windows_ocr::WindowsOcr;

#[cfg(target_os = "windows")]
mod windows_ocr {
    use super::{Recognition, TextRecognizer};
    use crate::{AutomationError, ScreenshotResult};
    use image::{DynamicImage, ImageBuffer, Rgba};
    use tracing::{debug, warn};
    use uni_ocr::{OcrEngine, OcrProvider};

    /// Windows.Media.Ocr through uni-ocr.
    #[derive(Debug, Default)]
    pub struct WindowsOcr;

    #[async_trait::async_trait]
    impl TextRecognizer for WindowsOcr {
        async fn recognize(
            &self,
            image: &ScreenshotResult,
        ) -> Result<Recognition, AutomationError> {
            let engine = match OcrEngine::new(OcrProvider::Auto) {
                Ok(engine) => engine,
                Err(e) => {
                    warn!("OCR engine unavailable: {}", e);
                    return Ok(Recognition::Unavailable);
                }
            };

            let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
                ImageBuffer::from_raw(image.width, image.height, image.image_data.clone())
                    .ok_or_else(|| {
                        AutomationError::InvalidArgument(
                            "screenshot buffer does not match its dimensions".to_string(),
                        )
                    })?;

            let (text, _language, _confidence) = engine
                .recognize_image(&DynamicImage::ImageRgba8(buffer))
                .await
                .map_err(|e| AutomationError::PlatformError(format!("OCR failed: {e}")))?;
            debug!("OCR recognized {} chars", text.chars().count());
            Ok(Recognition::Text(text))
        }
    }
}
