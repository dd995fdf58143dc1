use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::error::{DashboardError, Result};
use crate::models::{AggregateRow, TrendPoint, METRIC_CEILING};

/// Anything that can hand over a fixed-size pixel raster on demand.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Logical size in baseline (96 dpi) pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Stops animations and transitions so a capture sees a still frame.
    fn suspend_effects(&self);

    fn restore_effects(&self);

    /// Resolves once pending assets and fonts have settled.
    async fn settled(&self) -> Result<()> {
        Ok(())
    }

    async fn rasterize(&self, scale: f64) -> Result<RgbaImage>;
}

/// Effects stay suspended for as long as this guard lives.
pub struct EffectSuspension<'a> {
    surface: &'a dyn Surface,
}

impl<'a> EffectSuspension<'a> {
    pub fn acquire(surface: &'a dyn Surface) -> Self {
        surface.suspend_effects();
        Self { surface }
    }
}

impl Drop for EffectSuspension<'_> {
    fn drop(&mut self) {
        self.surface.restore_effects();
    }
}

/// Suspension bookkeeping shared by the built-in surfaces.
#[derive(Debug, Default)]
pub struct EffectState {
    suspended: AtomicBool,
    suspensions: AtomicUsize,
    restorations: AtomicUsize,
}

impl EffectState {
    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::SeqCst);
        self.suspensions.fetch_add(1, Ordering::SeqCst);
    }

    pub fn restore(&self) {
        self.suspended.store(false, Ordering::SeqCst);
        self.restorations.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub fn suspensions(&self) -> usize {
        self.suspensions.load(Ordering::SeqCst)
    }

    pub fn restorations(&self) -> usize {
        self.restorations.load(Ordering::SeqCst)
    }
}

fn scaled(value: u32, scale: f64) -> u32 {
    ((f64::from(value) * scale).round() as u32).max(1)
}

/// A pre-rendered image, e.g. a screenshot of the dashboard.
pub struct RasterSurface {
    image: RgbaImage,
    pub effects: EffectState,
}

impl RasterSurface {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            effects: EffectState::default(),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(image::open(path)?.to_rgba8()))
    }
}

#[async_trait]
impl Surface for RasterSurface {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn suspend_effects(&self) {
        self.effects.suspend();
    }

    fn restore_effects(&self) {
        self.effects.restore();
    }

    async fn rasterize(&self, scale: f64) -> Result<RgbaImage> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(DashboardError::Rasterize(format!("unusable scale {scale}")));
        }
        if (scale - 1.0).abs() < f64::EPSILON {
            return Ok(self.image.clone());
        }
        let (width, height) = self.image.dimensions();
        Ok(imageops::resize(
            &self.image,
            scaled(width, scale),
            scaled(height, scale),
            FilterType::Triangle,
        ))
    }
}

const CHART_WIDTH: u32 = 960;
const CHART_PADDING: u32 = 24;
const CHART_HEADER: u32 = 40;
const CHART_ROW: u32 = 28;
const CHART_GUTTER: u32 = 96;

const BACKGROUND_TOP: [u8; 3] = [43, 40, 56];
const GRID: Rgba<u8> = Rgba([38, 50, 68, 255]);
const TREND: Rgba<u8> = Rgba([179, 167, 255, 255]);
const EMPTY_BAR: Rgba<u8> = Rgba([71, 85, 105, 255]);

fn category_color(code: &str) -> Rgba<u8> {
    match code {
        "SCT" => Rgba([34, 211, 238, 255]),
        "BKN" => Rgba([96, 165, 250, 255]),
        "OVC" => Rgba([6, 182, 212, 255]),
        "FEW" => Rgba([167, 139, 250, 255]),
        "SKC" => Rgba([147, 197, 253, 255]),
        _ => Rgba([160, 185, 217, 255]),
    }
}

#[derive(Debug, Clone)]
struct ChartBar {
    average: f64,
    fitted: Option<f64>,
    category: String,
    empty: bool,
}

/// Draws a series as horizontal bars, one per bucket, with the fitted
/// trend marked on each bar.
pub struct ChartSurface {
    bars: Vec<ChartBar>,
    pub effects: EffectState,
}

impl ChartSurface {
    pub fn new(series: &[AggregateRow], trend: &[TrendPoint]) -> Self {
        let bars = series
            .iter()
            .map(|row| ChartBar {
                average: row.average,
                fitted: trend
                    .iter()
                    .find(|point| point.ordinal_index == row.ordinal_index)
                    .map(|point| point.fitted_value),
                category: row.dominant_category.clone(),
                empty: row.record_count == 0,
            })
            .collect();
        Self {
            bars,
            effects: EffectState::default(),
        }
    }

    fn draw(&self, scale: f64) -> RgbaImage {
        let (width, height) = self.dimensions();
        let width = scaled(width, scale);
        let height = scaled(height, scale);
        let padding = scaled(CHART_PADDING, scale);
        let header = scaled(CHART_HEADER, scale);
        let row = scaled(CHART_ROW, scale);
        let gutter = scaled(CHART_GUTTER, scale);

        let mut image = RgbaImage::new(width, height);
        paint_background(&mut image);

        let plot_left = padding + gutter;
        let plot_width = width.saturating_sub(plot_left + padding).max(1);
        let x_for = |value: f64| -> u32 {
            let ratio = (value / METRIC_CEILING).clamp(0.0, 1.0);
            plot_left + (ratio * f64::from(plot_width)).round() as u32
        };

        let plot_bottom = height.saturating_sub(padding);
        for okta in 0..=8 {
            let x = x_for(f64::from(okta));
            fill_rect(&mut image, x, header, 1, plot_bottom.saturating_sub(header), GRID);
        }

        let bar_height = (row * 2 / 3).max(1);
        for (idx, bar) in self.bars.iter().enumerate() {
            let top = header + row * idx as u32 + (row - bar_height) / 2;
            let color = if bar.empty {
                EMPTY_BAR
            } else {
                category_color(&bar.category)
            };
            let length = x_for(bar.average) - plot_left;
            fill_rect(&mut image, plot_left, top, length.max(1), bar_height, color);

            if let Some(fitted) = bar.fitted {
                let marker = scaled(2, scale);
                fill_rect(&mut image, x_for(fitted), top, marker, bar_height, TREND);
            }
        }

        image
    }
}

#[async_trait]
impl Surface for ChartSurface {
    fn dimensions(&self) -> (u32, u32) {
        let rows = self.bars.len().max(1) as u32;
        (
            CHART_WIDTH,
            CHART_HEADER + CHART_ROW * rows + CHART_PADDING,
        )
    }

    fn suspend_effects(&self) {
        self.effects.suspend();
    }

    fn restore_effects(&self) {
        self.effects.restore();
    }

    async fn rasterize(&self, scale: f64) -> Result<RgbaImage> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(DashboardError::Rasterize(format!("unusable scale {scale}")));
        }
        Ok(self.draw(scale))
    }
}

fn paint_background(image: &mut RgbaImage) {
    let height = image.height().max(1);
    for (_, y, pixel) in image.enumerate_pixels_mut() {
        let blend = y as f32 / height as f32;
        let r = (17.0 + (BACKGROUND_TOP[0] as f32 - 17.0) * (1.0 - blend)) as u8;
        let g = (20.0 + (BACKGROUND_TOP[1] as f32 - 20.0) * (1.0 - blend)) as u8;
        let b = (28.0 + (BACKGROUND_TOP[2] as f32 - 28.0) * (1.0 - blend)) as u8;
        *pixel = Rgba([r, g, b, 255]);
    }
}

fn fill_rect(image: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
    let x_end = x.saturating_add(width).min(image.width());
    let y_end = y.saturating_add(height).min(image.height());
    for py in y..y_end {
        for px in x..x_end {
            image.put_pixel(px, py, color);
        }
    }
}
