use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbaImage;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str};

use crate::error::Result;
use crate::paginate::{PageGeometry, PagePlan};

const PT_PER_MM: f32 = 72.0 / 25.4;
const FONT: Name<'static> = Name(b"F1");
const IMAGE: Name<'static> = Name(b"Im1");
const HEADER_SIZE: f32 = 10.0;
const FOOTER_SIZE: f32 = 9.0;

#[derive(Debug, Clone, Default)]
pub struct PageText {
    pub header: Option<String>,
    pub footer: Option<String>,
    pub number_pages: bool,
}

impl PageText {
    pub fn page_label(page: usize, total: usize) -> String {
        format!("page {page} of {total}")
    }
}

/// Builds one document with a page per slice. Each page carries the header
/// line, the slice scaled to the content width, and the footer line.
pub fn assemble(
    slices: &[RgbaImage],
    plan: &PagePlan,
    geometry: &PageGeometry,
    text: &PageText,
) -> Result<Vec<u8>> {
    let mut pdf = Pdf::new();
    let catalog_id = Ref::new(1);
    let tree_id = Ref::new(2);
    let font_id = Ref::new(3);
    let page_ids: Vec<Ref> = (0..slices.len())
        .map(|idx| Ref::new(4 + 3 * idx as i32))
        .collect();

    pdf.catalog(catalog_id).pages(tree_id);
    pdf.pages(tree_id)
        .kids(page_ids.iter().copied())
        .count(slices.len() as i32);
    pdf.type1_font(font_id).base_font(Name(b"Helvetica"));

    let page_w = geometry.width_mm as f32;
    let page_h = geometry.height_mm as f32;
    let margin = geometry.margin_mm as f32;
    let total = slices.len();

    for (idx, slice) in slices.iter().enumerate() {
        let page_id = page_ids[idx];
        let content_id = Ref::new(page_id.get() + 1);
        let image_id = Ref::new(page_id.get() + 2);

        let mut page = pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, page_w * PT_PER_MM, page_h * PT_PER_MM));
        page.parent(tree_id);
        page.contents(content_id);
        let mut resources = page.resources();
        resources.x_objects().pair(IMAGE, image_id);
        resources.fonts().pair(FONT, font_id);
        resources.finish();
        page.finish();

        let (width, height) = slice.dimensions();
        let pixels = compress(&flatten_rgb(slice))?;
        let mut image = pdf.image_xobject(image_id, &pixels);
        image.filter(Filter::FlateDecode);
        image.width(width as i32);
        image.height(height as i32);
        image.color_space().device_rgb();
        image.bits_per_component(8);
        image.finish();

        let mut content = Content::new();

        if let Some(header) = &text.header {
            content.set_fill_gray(60.0 / 255.0);
            content.begin_text();
            content.set_font(FONT, HEADER_SIZE);
            content.next_line(margin * PT_PER_MM, (page_h - margin) * PT_PER_MM);
            content.show(Str(&printable(header)));
            content.end_text();
        }

        let image_w = plan.content_width_mm as f32;
        let image_h = (f64::from(height) / plan.px_per_mm) as f32;
        let image_top = plan.content_top_mm as f32;
        content.save_state();
        content.transform([
            image_w * PT_PER_MM,
            0.0,
            0.0,
            image_h * PT_PER_MM,
            margin * PT_PER_MM,
            (page_h - image_top - image_h) * PT_PER_MM,
        ]);
        content.x_object(IMAGE);
        content.restore_state();

        let page_label = text
            .number_pages
            .then(|| PageText::page_label(idx + 1, total));
        if text.footer.is_some() || page_label.is_some() {
            content.set_fill_gray(80.0 / 255.0);
            if let Some(footer) = &text.footer {
                content.begin_text();
                content.set_font(FONT, FOOTER_SIZE);
                content.next_line(margin * PT_PER_MM, margin * PT_PER_MM);
                content.show(Str(&printable(footer)));
                content.end_text();
            }
            if let Some(label) = page_label {
                let label = printable(&label);
                let x = (page_w - margin) * PT_PER_MM - text_width(&label, FOOTER_SIZE);
                content.begin_text();
                content.set_font(FONT, FOOTER_SIZE);
                content.next_line(x, margin * PT_PER_MM);
                content.show(Str(&label));
                content.end_text();
            }
        }

        pdf.stream(content_id, &content.finish());
    }

    Ok(pdf.finish())
}

/// Composites the slice onto white and drops the alpha channel.
fn flatten_rgb(raster: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(raster.width() as usize * raster.height() as usize * 3);
    for pixel in raster.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u32::from(a);
        for channel in [r, g, b] {
            let blended = (u32::from(channel) * alpha + 255 * (255 - alpha)) / 255;
            rgb.push(blended as u8);
        }
    }
    rgb
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// The built-in Helvetica only covers ASCII reliably; dashes are folded
/// and anything else becomes `?`.
fn printable(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\u{2013}' | '\u{2014}' => b'-',
            ch if ch.is_ascii() && !ch.is_ascii_control() => ch as u8,
            _ => b'?',
        })
        .collect()
}

/// Rough Helvetica advance, good enough to right-align short labels.
fn text_width(text: &[u8], size: f32) -> f32 {
    text.len() as f32 * size * 0.5
}
