use anyhow::{anyhow, Context};
use printpdf::{BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point};

use crate::error::AppResult;
use crate::report::layout::{DrawOp, FontWeight, Page, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Writes laid-out pages into an A4 PDF using the built-in Helvetica faces.
pub fn render_pages(title: &str, pages: &[Page]) -> AppResult<Vec<u8>> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");

    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|error| anyhow!("failed to load Helvetica: {error}"))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|error| anyhow!("failed to load Helvetica-Bold: {error}"))?,
    };

    for (index, page) in pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) =
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            doc.get_page(page_index).get_layer(layer_index)
        };
        draw_page(&layer, &fonts, page);
    }

    let bytes = doc
        .save_to_bytes()
        .map_err(|error| anyhow!("{error}"))
        .context("failed to serialize PDF")?;
    Ok(bytes)
}

fn draw_page(layer: &PdfLayerReference, fonts: &Fonts, page: &Page) {
    layer.set_outline_thickness(0.5);

    for op in &page.ops {
        match op {
            DrawOp::Text {
                x,
                y,
                size,
                weight,
                text,
            } => {
                let font = match weight {
                    FontWeight::Regular => &fonts.regular,
                    FontWeight::Bold => &fonts.bold,
                };
                layer.use_text(text.as_str(), *size, Mm(*x), Mm(*y), font);
            }
            DrawOp::Rule { x1, x2, y } => {
                layer.add_line(Line {
                    points: vec![
                        (Point::new(Mm(*x1), Mm(*y)), false),
                        (Point::new(Mm(*x2), Mm(*y)), false),
                    ],
                    is_closed: false,
                });
            }
        }
    }
}
