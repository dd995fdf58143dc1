use std::io::Write;
use std::path::Path;

use image::imageops;
use serde::Serialize;

use crate::error::{DashboardError, Result};
use crate::models::Mode;
use crate::paginate::{self, PageGeometry};
use crate::pdf::{self, PageText};
use crate::range::ResolvedRange;
use crate::surface::{EffectSuspension, Surface};

pub const DEFAULT_FOOTER: &str = "Sky cover dashboard - generated automatically";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub geometry: PageGeometry,
    pub target_dpi: Option<f64>,
    /// Upper bound on capture magnification, keeps raster memory in check.
    pub max_scale: f64,
    pub header: Option<String>,
    pub footer: Option<String>,
    pub number_pages: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            geometry: PageGeometry::default(),
            target_dpi: None,
            max_scale: 3.0,
            header: None,
            footer: None,
            number_pages: true,
        }
    }
}

/// What a finished export produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportJob {
    pub source_surface_dimensions: (u32, u32),
    pub raster_dimensions: (u32, u32),
    pub page_geometry: PageGeometry,
    pub target_dpi: Option<f64>,
    pub scale: f64,
    pub header: Option<String>,
    pub footer: Option<String>,
    pub page_count: usize,
}

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub job: ExportJob,
    pub bytes: Vec<u8>,
}

pub fn default_document_name(mode: Mode) -> String {
    format!("dashboard_{}.pdf", mode.slug())
}

pub fn default_header(range: &ResolvedRange) -> String {
    let interval = range.interval;
    match (range.mode, range.month) {
        (Mode::SingleDay, _) => format!("Dashboard - day {}", interval.from),
        (Mode::CalendarMonth, Some(bounds)) => format!("Dashboard - month {}", bounds.key()),
        (Mode::Week, _) => format!("Dashboard - weeks {} to {}", interval.from, interval.to),
        _ => format!("Dashboard - range {} to {}", interval.from, interval.to),
    }
}

/// Captures `surface` and paginates it into a document held in memory.
///
/// Effects on the surface are suspended for the whole capture and restored
/// on every exit path, including errors and a dropped future. Concurrent
/// exports of one surface are not supported.
pub async fn render_document(
    surface: Option<&dyn Surface>,
    options: &ExportOptions,
) -> Result<RenderedDocument> {
    let surface = surface.ok_or(DashboardError::MissingSurface)?;
    let scale = paginate::effective_scale(options.target_dpi, options.max_scale);

    let raster = {
        let _suspension = EffectSuspension::acquire(surface);
        surface.settled().await?;
        surface.rasterize(scale).await?
    };

    let layout = paginate::plan(
        raster.dimensions(),
        &options.geometry,
        options.header.is_some(),
        options.footer.is_some(),
    )?;
    let slices: Vec<_> = layout
        .slices
        .iter()
        .map(|slice| imageops::crop_imm(&raster, 0, slice.y, raster.width(), slice.height).to_image())
        .collect();

    let text = PageText {
        header: options.header.clone(),
        footer: options.footer.clone(),
        number_pages: options.number_pages,
    };
    let bytes = pdf::assemble(&slices, &layout, &options.geometry, &text)?;

    let job = ExportJob {
        source_surface_dimensions: surface.dimensions(),
        raster_dimensions: raster.dimensions(),
        page_geometry: options.geometry,
        target_dpi: options.target_dpi,
        scale,
        header: options.header.clone(),
        footer: options.footer.clone(),
        page_count: layout.page_count(),
    };
    tracing::info!(
        pages = job.page_count,
        scale = job.scale,
        width = job.raster_dimensions.0,
        height = job.raster_dimensions.1,
        "document rendered"
    );

    Ok(RenderedDocument { job, bytes })
}

/// Renders and delivers the document under `path`. Nothing is written
/// unless rendering succeeds, and the file appears in one step.
pub async fn export_to_file(
    surface: Option<&dyn Surface>,
    options: &ExportOptions,
    path: &Path,
) -> Result<ExportJob> {
    let document = render_document(surface, options).await?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(&document.bytes)?;
    staged.flush()?;
    staged.persist(path).map_err(|err| DashboardError::Io(err.error))?;

    tracing::info!(path = %path.display(), pages = document.job.page_count, "document exported");
    Ok(document.job)
}
