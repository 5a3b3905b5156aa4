use crate::ReportError;
use crate::chart::Chart;
use image::RgbImage;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Pt, TextMatrix, image_crate,
};
use std::io::BufWriter;
use std::path::Path;

// A4 portrait, matching the default page of most report generators.
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 10.0;
const LINE_HEIGHT: f32 = 10.0;
const FONT_SIZE: f32 = 12.0;
const PT_PER_MM: f32 = 72.0 / 25.4;

/// Sequential page writer: text lines flow top-down from a cursor, like
/// cells in a simple report layout. All lengths are millimetres.
pub struct ReportWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    layer: PdfLayerReference,
    /// Distance of the next free line from the bottom edge.
    cursor_y: f32,
    pages: usize,
}

impl ReportWriter {
    pub fn new(title: &str) -> Result<Self, ReportError> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Pdf(format!("font error: {e}")))?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            font,
            layer,
            cursor_y: PAGE_HEIGHT - MARGIN,
            pages: 1,
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages
    }

    pub fn add_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor_y = PAGE_HEIGHT - MARGIN;
        self.pages += 1;
    }

    /// Write one left-aligned line and advance the cursor.
    pub fn line(&mut self, text: &str) {
        self.write_line(text, MARGIN);
    }

    /// Write one line centred on the page and advance the cursor.
    pub fn centered_line(&mut self, text: &str) {
        let width_mm = crate::chart::text_width(text, FONT_SIZE) / PT_PER_MM;
        let x = ((PAGE_WIDTH - width_mm) / 2.0).max(MARGIN);
        self.write_line(text, x);
    }

    fn write_line(&mut self, text: &str, x: f32) {
        if self.cursor_y - LINE_HEIGHT < MARGIN {
            self.add_page();
        }
        self.cursor_y -= LINE_HEIGHT;
        let baseline = self.cursor_y + (LINE_HEIGHT - FONT_SIZE / PT_PER_MM) / 2.0;
        self.layer
            .use_text(text, FONT_SIZE, Mm(x), Mm(baseline), &self.font);
    }

    /// Embed a raster image below the cursor, `width` millimetres wide
    /// (shrunk if it would not fit above the bottom margin).
    ///
    /// Returns the placement so callers can draw over the image.
    pub fn image(&mut self, image: &RgbImage, width: f32) -> Result<Placement, ReportError> {
        let (px_width, px_height) = image.dimensions();
        if px_width == 0 || px_height == 0 {
            return Err(ReportError::Pdf("image has no pixels".to_string()));
        }

        let top = self.cursor_y - 5.0;
        let available = (top - MARGIN).max(1.0);
        let mut mm_per_px = width / px_width as f32;
        if px_height as f32 * mm_per_px > available {
            mm_per_px = available / px_height as f32;
        }
        let height = px_height as f32 * mm_per_px;

        let buffer = image_crate::RgbImage::from_raw(px_width, px_height, image.as_raw().clone())
            .ok_or_else(|| ReportError::Pdf("image buffer size mismatch".to_string()))?;
        let pdf_image = Image::from_dynamic_image(&image_crate::DynamicImage::ImageRgb8(buffer));

        let placement = Placement {
            x: MARGIN,
            y: top - height,
            mm_per_px,
            px_height: px_height as f32,
        };

        pdf_image.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(placement.x)),
                translate_y: Some(Mm(placement.y)),
                dpi: Some(25.4 / mm_per_px),
                ..Default::default()
            },
        );

        self.cursor_y = placement.y;
        Ok(placement)
    }

    /// Embed a chart and draw its labels at the matching scale.
    pub fn chart(&mut self, chart: &Chart, width: f32) -> Result<(), ReportError> {
        let placement = self.image(&chart.image, width)?;

        for label in &chart.labels {
            let (x, y) = placement.to_page(label.x, label.y);
            let size = label.size * placement.mm_per_px * PT_PER_MM;

            self.layer.begin_text_section();
            self.layer.set_font(&self.font, size);
            self.layer.set_text_matrix(TextMatrix::TranslateRotate(
                Pt(x * PT_PER_MM),
                Pt(y * PT_PER_MM),
                label.rotation,
            ));
            self.layer.write_text(label.text.clone(), &self.font);
            self.layer.end_text_section();
        }

        Ok(())
    }

    pub fn finish(self) -> Result<Vec<u8>, ReportError> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| ReportError::Pdf(format!("save error: {e}")))?;
        buf.into_inner()
            .map_err(|e| ReportError::Pdf(format!("buffer error: {e}")))
    }
}

/// Where an image landed on the page, in millimetres from the bottom-left.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub mm_per_px: f32,
    px_height: f32,
}

impl Placement {
    /// Convert image pixel coordinates (origin top-left) to page millimetres.
    pub fn to_page(&self, px: f32, py: f32) -> (f32, f32) {
        (
            self.x + px * self.mm_per_px,
            self.y + (self.px_height - py) * self.mm_per_px,
        )
    }
}

/// Decode any supported image file into RGB for embedding.
pub fn load_rgb(path: &Path) -> Result<RgbImage, ReportError> {
    let bytes = std::fs::read(path)?;
    Ok(image::load_from_memory(&bytes)?.to_rgb8())
}
