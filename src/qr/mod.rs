//! QR code rendering.
//!
//! Codes encode the public verification URL only. Certificate data never
//! ends up in the image.

use std::fmt::Write as _;

use qrcode::{Color, EcLevel, QrCode};

use crate::config::QrConfig;
use crate::errors::{Error, Result};

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";

/// Rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrOptions {
    /// Quiet zone width in modules.
    pub margin: u32,
    /// Pixels per module.
    pub scale: u32,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self { margin: 1, scale: 8 }
    }
}

impl From<&QrConfig> for QrOptions {
    fn from(config: &QrConfig) -> Self {
        Self { margin: config.margin, scale: config.scale }
    }
}

/// A rendered image ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

impl QrImage {
    /// `data:` URI form of the image, used by uploads that take inline files.
    pub fn to_data_uri(&self) -> String {
        use base64::Engine as _;
        format!(
            "data:{};base64,{}",
            self.content_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

pub trait QrRenderer: Send + Sync {
    fn render(&self, content: &str, options: &QrOptions) -> Result<QrImage>;
}

/// Renders black-on-white SVG codes at error correction level M.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgQrRenderer;

impl QrRenderer for SvgQrRenderer {
    fn render(&self, content: &str, options: &QrOptions) -> Result<QrImage> {
        if content.is_empty() {
            return Err(Error::qr_render("QR content cannot be empty"));
        }
        if options.scale == 0 {
            return Err(Error::qr_render("QR scale must be at least 1"));
        }

        let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::M)
            .map_err(|e| Error::qr_render(format!("Failed to encode QR content: {}", e)))?;

        let svg = to_svg(code.width() as u32, &code.to_colors(), options);
        Ok(QrImage { bytes: svg.into_bytes(), content_type: SVG_CONTENT_TYPE })
    }
}

fn to_svg(width: u32, colors: &[Color], options: &QrOptions) -> String {
    let scale = options.scale;
    let size = (width + 2 * options.margin) * scale;

    let mut path = String::new();
    for (index, color) in colors.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let index = index as u32;
        let x = (index % width + options.margin) * scale;
        let y = (index / width + options.margin) * scale;
        // Writing into a String cannot fail.
        let _ = write!(path, "M{x} {y}h{scale}v{scale}h-{scale}z");
    }

    format!(
        concat!(
            r#"<?xml version="1.0" standalone="yes"?>"#,
            r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="{size}" height="{size}" viewBox="0 0 {size} {size}" shape-rendering="crispEdges">"#,
            r##"<rect x="0" y="0" width="{size}" height="{size}" fill="#ffffff"/>"##,
            r##"<path fill="#000000" d="{path}"/>"##,
            "</svg>"
        ),
        size = size,
        path = path
    )
}
