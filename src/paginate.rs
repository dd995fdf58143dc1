use serde::Serialize;

use crate::error::{DashboardError, Result};

/// Resolution at which a surface reports its logical size.
pub const BASELINE_DPI: f64 = 96.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    A4,
    Letter,
}

impl PageSize {
    fn portrait_mm(self) -> (f64, f64) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Physical page layout in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    pub width_mm: f64,
    pub height_mm: f64,
    pub margin_mm: f64,
    /// Extra band below the header line, only reserved when a header is set.
    pub header_gap_mm: f64,
    /// Extra band above the footer line, only reserved when a footer is set.
    pub footer_gap_mm: f64,
}

impl PageGeometry {
    pub fn new(size: PageSize, orientation: Orientation) -> Self {
        let (short, long) = size.portrait_mm();
        let (width_mm, height_mm) = match orientation {
            Orientation::Portrait => (short, long),
            Orientation::Landscape => (long, short),
        };
        Self {
            width_mm,
            height_mm,
            margin_mm: 12.0,
            header_gap_mm: 6.0,
            footer_gap_mm: 6.0,
        }
    }

    pub fn with_margin(mut self, margin_mm: f64) -> Self {
        self.margin_mm = margin_mm;
        self
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::new(PageSize::A4, Orientation::Portrait)
    }
}

/// Capture magnification for a requested output resolution, capped by
/// `max_scale`. Without a target the surface is captured at baseline.
pub fn effective_scale(target_dpi: Option<f64>, max_scale: f64) -> f64 {
    let requested = target_dpi
        .filter(|dpi| dpi.is_finite() && *dpi > 0.0)
        .map(|dpi| dpi / BASELINE_DPI)
        .unwrap_or(1.0);
    requested.min(max_scale)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub index: usize,
    pub y: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    pub content_width_mm: f64,
    pub content_height_mm: f64,
    /// Distance from the page top to the start of the content area.
    pub content_top_mm: f64,
    pub px_per_mm: f64,
    pub slice_height_px: u32,
    pub slices: Vec<Slice>,
}

impl PagePlan {
    pub fn page_count(&self) -> usize {
        self.slices.len()
    }

    pub fn slice_height_mm(&self, slice: &Slice) -> f64 {
        f64::from(slice.height) / self.px_per_mm
    }
}

/// Splits a `width` x `height` raster into page-sized horizontal slices.
/// The raster is scaled to fill the content width; the last slice may be
/// shorter than the rest.
pub fn plan(
    raster: (u32, u32),
    geometry: &PageGeometry,
    has_header: bool,
    has_footer: bool,
) -> Result<PagePlan> {
    let (width, height) = raster;
    if width == 0 || height == 0 {
        return Err(DashboardError::Rasterize(format!(
            "empty raster {width}x{height}"
        )));
    }

    let top = geometry.margin_mm + if has_header { geometry.header_gap_mm } else { 0.0 };
    let bottom = geometry.margin_mm + if has_footer { geometry.footer_gap_mm } else { 0.0 };
    let content_width_mm = geometry.width_mm - geometry.margin_mm * 2.0;
    let content_height_mm = geometry.height_mm - top - bottom;
    if content_width_mm <= 0.0 || content_height_mm <= 0.0 {
        return Err(DashboardError::InvalidGeometry(format!(
            "no content area left on a {}x{} mm page",
            geometry.width_mm, geometry.height_mm
        )));
    }

    let px_per_mm = f64::from(width) / content_width_mm;
    let slice_height_px = ((content_height_mm * px_per_mm).floor() as u32).max(1);
    let page_count = height.div_ceil(slice_height_px).max(1);

    let slices = (0..page_count)
        .map(|page| {
            let y = page * slice_height_px;
            Slice {
                index: page as usize,
                y,
                height: slice_height_px.min(height - y),
            }
        })
        .collect();

    Ok(PagePlan {
        content_width_mm,
        content_height_mm,
        content_top_mm: top,
        px_per_mm,
        slice_height_px,
        slices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_and_a_half_pages_need_three() {
        // A4 with 12 mm margins leaves 186 x 273 mm; 1860 px wide gives 10 px/mm.
        let geometry = PageGeometry::default();
        let plan = plan((1860, 6825), &geometry, false, false).unwrap();
        assert_eq!(plan.px_per_mm, 10.0);
        assert_eq!(plan.slice_height_px, 2730);
        assert_eq!(plan.page_count(), 3);
        assert_eq!(plan.slices[0].height, 2730);
        assert_eq!(plan.slices[1].y, 2730);
        assert_eq!(plan.slices[2].height, 1365);
        assert!(plan.slices[2].height < plan.slices[0].height);
    }

    #[test]
    fn slices_cover_the_raster_exactly() {
        let plan = plan((1200, 9001), &PageGeometry::default(), true, true).unwrap();
        let covered: u32 = plan.slices.iter().map(|s| s.height).sum();
        assert_eq!(covered, 9001);
        for pair in plan.slices.windows(2) {
            assert_eq!(pair[0].y + pair[0].height, pair[1].y);
        }
    }

    #[test]
    fn header_and_footer_bands_shrink_content() {
        let geometry = PageGeometry::default();
        let bare = plan((1860, 100), &geometry, false, false).unwrap();
        let banded = plan((1860, 100), &geometry, true, true).unwrap();
        assert_eq!(bare.content_height_mm, 273.0);
        assert_eq!(banded.content_height_mm, 261.0);
        assert_eq!(banded.content_top_mm, 18.0);
    }

    #[test]
    fn short_raster_fits_one_page() {
        let plan = plan((1860, 10), &PageGeometry::default(), false, false).unwrap();
        assert_eq!(plan.page_count(), 1);
        assert_eq!(plan.slice_height_mm(&plan.slices[0]), 1.0);
    }

    #[test]
    fn oversized_margins_are_rejected() {
        let geometry = PageGeometry::default().with_margin(120.0);
        assert!(matches!(
            plan((100, 100), &geometry, false, false),
            Err(DashboardError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn scale_is_capped() {
        assert_eq!(effective_scale(Some(192.0), 3.0), 2.0);
        assert_eq!(effective_scale(Some(600.0), 3.0), 3.0);
        assert_eq!(effective_scale(None, 3.0), 1.0);
    }

    #[test]
    fn landscape_swaps_sides() {
        let geometry = PageGeometry::new(PageSize::A4, Orientation::Landscape);
        assert_eq!((geometry.width_mm, geometry.height_mm), (297.0, 210.0));
    }
}
