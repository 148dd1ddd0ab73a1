//! PDF rendering of [`ReportTable`]s: letter pages, a title line and a
//! gridded table with a grey header row over a beige body.

use crate::error::{AnalyticsError, Result};
use crate::export::ReportTable;
use log::warn;
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Rect, Rgb,
};
use std::io::Cursor;
use std::path::Path;

const PAGE_WIDTH: f32 = 215.9;
const PAGE_HEIGHT: f32 = 279.4;
const MARGIN: f32 = 18.0;
const ROW_HEIGHT: f32 = 7.0;
const TITLE_SIZE: f32 = 16.0;
const HEADER_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 9.0;
const LOGO_HEIGHT: f32 = 20.0;

fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

fn grey() -> Color {
    rgb(0.5, 0.5, 0.5)
}

fn whitesmoke() -> Color {
    rgb(0.96, 0.96, 0.96)
}

fn beige() -> Color {
    rgb(0.96, 0.96, 0.86)
}

fn black() -> Color {
    rgb(0.0, 0.0, 0.0)
}

fn pdf_err(e: impl std::fmt::Display) -> AnalyticsError {
    AnalyticsError::Pdf(e.to_string())
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Builtin fonts only cover WinAnsi, so the colón sign is spelled out and
/// anything else outside Latin-1 becomes `?`.
fn pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '₡' => out.push_str("CRC"),
            c if (c as u32) < 0x100 => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Cuts `text` so it fits a column of `width` mm at `size` pt.
fn fit(text: &str, width: f32, size: f32) -> String {
    // Helvetica averages roughly half an em per glyph.
    let text = pdf_text(text);
    let max_chars = ((width - 2.0) / (size * 0.3528 * 0.5)).floor().max(1.0) as usize;
    if text.chars().count() <= max_chars {
        text
    } else {
        let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        cut.push_str("...");
        cut
    }
}

fn draw_row(
    layer: &PdfLayerReference,
    cells: &[String],
    top: f32,
    col_width: f32,
    background: Color,
    text_color: Color,
    font: &IndirectFontRef,
    size: f32,
) {
    for (idx, cell) in cells.iter().enumerate() {
        let left = MARGIN + idx as f32 * col_width;
        layer.set_fill_color(background.clone());
        layer.set_outline_color(black());
        layer.set_outline_thickness(0.5);
        layer.add_rect(
            Rect::new(Mm(left), Mm(top - ROW_HEIGHT), Mm(left + col_width), Mm(top))
                .with_mode(PaintMode::FillStroke),
        );

        layer.set_fill_color(text_color.clone());
        layer.use_text(
            fit(cell, col_width, size),
            size,
            Mm(left + 1.5),
            Mm(top - ROW_HEIGHT + 2.2),
            font,
        );
    }
}

fn add_logo(layer: &PdfLayerReference, logo: &Path) -> f32 {
    let bytes = match std::fs::read(logo) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Logo not found at {}: {}", logo.display(), e);
            return 0.0;
        }
    };
    let decoder = match printpdf::image_crate::codecs::png::PngDecoder::new(Cursor::new(bytes)) {
        Ok(decoder) => decoder,
        Err(e) => {
            warn!("Logo at {} is not a readable PNG: {}", logo.display(), e);
            return 0.0;
        }
    };
    match Image::try_from(decoder) {
        Ok(image) => {
            image.add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(Mm(MARGIN)),
                    translate_y: Some(Mm(PAGE_HEIGHT - MARGIN - LOGO_HEIGHT)),
                    ..Default::default()
                },
            );
            LOGO_HEIGHT + 4.0
        }
        Err(e) => {
            warn!("Logo at {} could not be embedded: {}", logo.display(), e);
            0.0
        }
    }
}

fn new_page(doc: &PdfDocumentReference) -> PdfLayerReference {
    let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Tabla");
    doc.get_page(page).get_layer(layer)
}

/// Renders `table` as a PDF. A missing or unreadable `logo` is skipped with a
/// warning.
pub fn render_table(table: &ReportTable, logo: Option<&Path>) -> Result<Vec<u8>> {
    let (doc, page, layer) =
        PdfDocument::new(&table.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Tabla");
    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_err)?,
    };
    let mut layer = doc.get_page(page).get_layer(layer);

    let mut top = PAGE_HEIGHT - MARGIN;
    if let Some(path) = logo {
        top -= add_logo(&layer, path);
    }

    layer.set_fill_color(black());
    layer.use_text(
        pdf_text(&table.title),
        TITLE_SIZE,
        Mm(MARGIN),
        Mm(top - TITLE_SIZE * 0.3528),
        &fonts.bold,
    );
    top -= TITLE_SIZE * 0.3528 + 6.0;

    let columns = table.columns.len().max(1) as f32;
    let col_width = (PAGE_WIDTH - 2.0 * MARGIN) / columns;

    draw_row(
        &layer,
        &table.columns,
        top,
        col_width,
        grey(),
        whitesmoke(),
        &fonts.bold,
        HEADER_SIZE,
    );
    top -= ROW_HEIGHT;

    for row in &table.rows {
        if top - ROW_HEIGHT < MARGIN {
            layer = new_page(&doc);
            top = PAGE_HEIGHT - MARGIN;
            draw_row(
                &layer,
                &table.columns,
                top,
                col_width,
                grey(),
                whitesmoke(),
                &fonts.bold,
                HEADER_SIZE,
            );
            top -= ROW_HEIGHT;
        }
        let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        draw_row(
            &layer,
            &cells,
            top,
            col_width,
            beige(),
            black(),
            &fonts.regular,
            BODY_SIZE,
        );
        top -= ROW_HEIGHT;
    }

    doc.save_to_bytes().map_err(pdf_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{CellKind, ReportCell};

    fn table(rows: usize) -> ReportTable {
        let mut table = ReportTable::new(
            "Reporte de Ventas por Cliente - ASEAVNA",
            vec![
                ("Cliente".to_string(), CellKind::Text),
                ("Ventas Totales (₡)".to_string(), CellKind::Number),
            ],
        );
        for i in 0..rows {
            table.push_row(vec![
                ReportCell::Text(format!("Cliente {}", i)),
                ReportCell::Number(1000.0 + i as f64),
            ]);
        }
        table
    }

    #[test]
    fn test_renders_pdf_bytes() {
        let bytes = render_table(&table(3), None).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_long_tables_paginate_and_missing_logo_is_skipped() {
        let bytes = render_table(&table(120), Some(Path::new("/nonexistent/logo.png"))).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_fit_truncates_long_text() {
        let long = "x".repeat(200);
        let cut = fit(&long, 30.0, BODY_SIZE);
        assert!(cut.chars().count() < 200);
        assert!(cut.ends_with("..."));
        assert_eq!(fit("Ana", 30.0, BODY_SIZE), "Ana");
    }

    #[test]
    fn test_colon_sign_is_spelled_out_for_builtin_fonts() {
        assert_eq!(pdf_text("Ventas Totales (₡)"), "Ventas Totales (CRC)");
        assert_eq!(pdf_text("Línea Ñandú"), "Línea Ñandú");
        assert_eq!(pdf_text("Café ☕"), "Café ?");
        assert_eq!(fit("₡", 30.0, BODY_SIZE), "CRC");
    }
}
