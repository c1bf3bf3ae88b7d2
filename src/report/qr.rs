use std::io::Cursor;

use anyhow::Context;
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma};
use qrcode::{Color, EcLevel, QrCode};

use crate::error::AppResult;

const BORDER_MODULES: usize = 2;
const MODULE_PX: u32 = 10;

/// Dark/light module grid of a QR code, including the quiet border.
pub struct QrMatrix {
    width: usize,
    dark: Vec<bool>,
}

impl QrMatrix {
    pub fn encode(data: &str) -> AppResult<Self> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)
            .context("failed to encode QR code")?;

        let inner = code.width();
        let width = inner + 2 * BORDER_MODULES;
        let mut dark = vec![false; width * width];

        for (index, color) in code.to_colors().into_iter().enumerate() {
            if color == Color::Dark {
                let row = index / inner + BORDER_MODULES;
                let column = index % inner + BORDER_MODULES;
                dark[row * width + column] = true;
            }
        }

        Ok(Self { width, dark })
    }

    /// Modules per side, border included.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_dark(&self, row: usize, column: usize) -> bool {
        row < self.width && column < self.width && self.dark[row * self.width + column]
    }
}

pub fn render_png(data: &str) -> AppResult<Vec<u8>> {
    let matrix = QrMatrix::encode(data)?;
    let side = matrix.width() as u32 * MODULE_PX;

    let image = ImageBuffer::from_fn(side, side, |x, y| {
        let row = (y / MODULE_PX) as usize;
        let column = (x / MODULE_PX) as usize;
        if matrix.is_dark(row, column) {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });

    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("failed to encode QR code PNG")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::{render_png, QrMatrix, BORDER_MODULES};

    #[test]
    fn matrix_has_light_quiet_border() {
        let matrix = QrMatrix::encode("https://maint.example.org/a/token/").expect("qr");
        let width = matrix.width();

        for index in 0..width {
            for border in 0..BORDER_MODULES {
                assert!(!matrix.is_dark(border, index));
                assert!(!matrix.is_dark(index, border));
                assert!(!matrix.is_dark(width - 1 - border, index));
            }
        }
        // finder pattern corner
        assert!(matrix.is_dark(BORDER_MODULES, BORDER_MODULES));
    }

    #[test]
    fn png_is_ten_pixels_per_module() {
        let url = "https://maint.example.org/a/5d0c8a9e-1b9e-4a57-9a43-0f4d4c3c2a10/";
        let bytes = render_png(url).expect("png should render");
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));

        let image = image::load_from_memory(&bytes).expect("png should decode");
        let matrix = QrMatrix::encode(url).expect("qr");
        assert_eq!(image.width(), matrix.width() as u32 * 10);
        assert_eq!(image.height(), image.width());
    }
}
