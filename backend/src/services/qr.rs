//! QR label rendering

use qrcode::render::svg;
use qrcode::QrCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),
}

/// Renders label tokens as SVG QR codes
#[derive(Debug, Clone)]
pub struct QrRenderer {
    min_size: u32,
}

impl QrRenderer {
    pub fn new(min_size: u32) -> Self {
        Self { min_size }
    }

    pub fn render_svg(&self, content: &str) -> Result<String, RenderError> {
        let code = QrCode::new(content.as_bytes())?;
        Ok(code
            .render::<svg::Color>()
            .min_dimensions(self.min_size, self.min_size)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#ffffff"))
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_token_as_svg() {
        let svg = QrRenderer::new(120)
            .render_svg("PO0001-ITM-000001-9f2c1a7e")
            .unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_oversized_payload_fails() {
        let payload = "X".repeat(8000);
        assert!(QrRenderer::new(120).render_svg(&payload).is_err());
    }
}
