use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::AutomationError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            device_scale_factor: 1.0,
        }
    }
}

/// Rectangular area of the page, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FromStr for Region {
    type Err = AutomationError;

    /// Parses `"x,y,width,height"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AutomationError::ValidationFailed(format!("invalid region '{}': {}", s, e)))?;

        match parts.as_slice() {
            [x, y, width, height] if *width > 0.0 && *height > 0.0 => Ok(Region {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
            }),
            _ => Err(AutomationError::ValidationFailed(format!(
                "region must be 'x,y,width,height' with a positive size, got '{}'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "webp" => Ok(ImageFormat::Webp),
            other => Err(AutomationError::ValidationFailed(format!(
                "unsupported screenshot format '{}'",
                other
            ))),
        }
    }
}

/// What the screenshot collaborator is asked to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRequest {
    pub region: Option<Region>,
    pub quality: u8,
    pub format: ImageFormat,
}

impl Default for ScreenshotRequest {
    fn default() -> Self {
        Self {
            region: None,
            quality: 80,
            format: ImageFormat::Png,
        }
    }
}

/// Capabilities a page driver advertises.
#[derive(Debug, Clone, Serialize)]
pub struct PageCapabilities {
    pub supports_javascript: bool,
    pub supports_screenshots: bool,
    pub supports_change_tracking: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_regions() {
        let region: Region = "10, 20, 300,200".parse().unwrap();
        assert_eq!(region.width, 300.0);
        assert!("1,2,3".parse::<Region>().is_err());
        assert!("0,0,0,10".parse::<Region>().is_err());
    }

    #[test]
    fn parses_image_formats() {
        assert_eq!("JPG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert!("gif".parse::<ImageFormat>().is_err());
    }
}
