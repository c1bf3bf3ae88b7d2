use anyhow::anyhow;
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, Greyscale, Mm, PdfDocument, PdfLayerReference, Point, Polygon,
};

use crate::db::models::AssetRecord;
use crate::error::AppResult;
use crate::report::layout::{wrap_text, FontWeight, MARGIN_MM, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};
use crate::report::qr::QrMatrix;

const QR_SIDE_MM: f32 = 60.0;
const TOP_MM: f32 = PAGE_HEIGHT_MM - 25.0;

/// Text lines printed above the QR code, top to bottom.
pub fn label_lines(asset: &AssetRecord) -> Vec<(f32, FontWeight, String)> {
    let mut lines = vec![
        (12.0, FontWeight::Regular, asset.site_name.clone()),
        (20.0, FontWeight::Bold, asset.name.clone()),
    ];

    if !asset.asset_type.trim().is_empty() {
        lines.push((11.0, FontWeight::Regular, format!("Tipo: {}", asset.asset_type)));
    }
    if !asset.serial.trim().is_empty() {
        lines.push((11.0, FontWeight::Regular, format!("Seriale: {}", asset.serial)));
    }

    lines
}

/// Printable A4 label: asset identity, a 60 mm vector QR code and its URL.
pub fn render_label(asset: &AssetRecord, public_url: &str) -> AppResult<Vec<u8>> {
    let title = format!("Etichetta {}", asset.name);
    let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|error| anyhow!("failed to load Helvetica: {error}"))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|error| anyhow!("failed to load Helvetica-Bold: {error}"))?;
    let layer = doc.get_page(page).get_layer(layer);

    let width = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
    let mut cursor = TOP_MM;
    for (size, weight, text) in label_lines(asset) {
        let font = match weight {
            FontWeight::Regular => &regular,
            FontWeight::Bold => &bold,
        };
        for line in wrap_text(&text, width, size, weight) {
            layer.use_text(line, size, Mm(MARGIN_MM), Mm(cursor), font);
            cursor -= size * 0.5;
        }
        cursor -= 2.0;
    }

    let matrix = QrMatrix::encode(public_url)?;
    let qr_top = cursor - 4.0;
    draw_qr(&layer, &matrix, MARGIN_MM, qr_top);

    cursor = qr_top - QR_SIDE_MM - 6.0;
    for line in wrap_text(public_url, width, 8.0, FontWeight::Regular) {
        layer.use_text(line, 8.0, Mm(MARGIN_MM), Mm(cursor), &regular);
        cursor -= 4.0;
    }

    let bytes = doc
        .save_to_bytes()
        .map_err(|error| anyhow!("failed to serialize label PDF: {error}"))?;
    Ok(bytes)
}

fn draw_qr(layer: &PdfLayerReference, matrix: &QrMatrix, left: f32, top: f32) {
    let module = QR_SIDE_MM / matrix.width() as f32;
    layer.set_fill_color(Color::Greyscale(Greyscale::new(0.0, None)));

    let mut rings = vec![];
    for row in 0..matrix.width() {
        for column in 0..matrix.width() {
            if !matrix.is_dark(row, column) {
                continue;
            }
            let x = left + column as f32 * module;
            let y = top - (row as f32 + 1.0) * module;
            rings.push(vec![
                (Point::new(Mm(x), Mm(y)), false),
                (Point::new(Mm(x + module), Mm(y)), false),
                (Point::new(Mm(x + module), Mm(y + module)), false),
                (Point::new(Mm(x), Mm(y + module)), false),
            ]);
        }
    }

    layer.add_polygon(Polygon {
        rings,
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    });
}
