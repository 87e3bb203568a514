use crate::core::PageDriver;
use crate::errors::{AutomationError, Result};
use crate::types::ScreenshotRequest;
use base64::{engine::general_purpose, Engine};
use std::path::Path;

pub struct ScreenshotManager;

impl ScreenshotManager {
    pub fn encode(bytes: &[u8]) -> String {
        general_purpose::STANDARD.encode(bytes)
    }

    /// Capture through the driver. Unsupported drivers report `BROWSER_NOT_SUPPORTED`;
    /// every other failure becomes `SCREENSHOT_FAILED`.
    pub async fn take_bytes(page: &mut dyn PageDriver, request: &ScreenshotRequest) -> Result<Vec<u8>> {
        if !page.capabilities().supports_screenshots {
            return Err(AutomationError::BrowserNotSupported(
                "page driver cannot capture screenshots".to_string(),
            ));
        }
        match page.screenshot(request).await {
            Ok(bytes) if bytes.is_empty() => Err(AutomationError::ScreenshotFailed(
                "driver returned an empty image".to_string(),
            )),
            Ok(bytes) => Ok(bytes),
            Err(err @ AutomationError::BrowserNotSupported(_)) => Err(err),
            Err(err @ AutomationError::ScreenshotFailed(_)) => Err(err),
            Err(err) => Err(AutomationError::ScreenshotFailed(err.to_string())),
        }
    }

    pub async fn take_base64(page: &mut dyn PageDriver, request: &ScreenshotRequest) -> Result<String> {
        let bytes = Self::take_bytes(page, request).await?;
        Ok(Self::encode(&bytes))
    }

    pub async fn save_to_file(
        page: &mut dyn PageDriver,
        request: &ScreenshotRequest,
        file_path: impl AsRef<Path>,
    ) -> Result<usize> {
        let bytes = Self::take_bytes(page, request).await?;
        tokio::fs::write(file_path, &bytes).await?;
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_standard_base64() {
        assert_eq!(ScreenshotManager::encode(b"png"), "cG5n");
        assert_eq!(ScreenshotManager::encode(&[]), "");
    }
}
