//! Freehand mask painted over the reference image.
//!
//! The raster always has the reference image's natural size. Pointer
//! coordinates arrive in display space and are scaled by natural/display so a
//! stroke lands on the same pixels at any zoom level.

use super::upload::DataUri;
use crate::{Error, Result, schema::Dimensions};
use image::{ImageFormat, Rgba, RgbaImage};
use tracing::debug;

pub const DEFAULT_BRUSH_SIZE: u32 = 20;
pub const MIN_BRUSH_SIZE: u32 = 1;
pub const MAX_BRUSH_SIZE: u32 = 100;

/// Largest reference image a mask can be painted over. Every undo step keeps
/// a full RGBA copy of the raster.
pub const MAX_MASK_PIXELS: u64 = 32 * 1024 * 1024;

const STROKE: Rgba<u8> = Rgba([255, 255, 255, 255]);

struct ActiveStroke {
    last: (f32, f32),
    before: RgbaImage,
}

pub struct MaskCanvas {
    raster: RgbaImage,
    history: Vec<RgbaImage>,
    scale_x: f32,
    scale_y: f32,
    brush_size: u32,
    active: Option<ActiveStroke>,
}

impl MaskCanvas {
    pub fn new(natural: Dimensions, display_width: f32, display_height: f32) -> Result<Self> {
        if natural.width == 0 || natural.height == 0 {
            return Err(Error::upload("Reference image has no pixels"));
        }
        let pixels = natural.width as u64 * natural.height as u64;
        if pixels > MAX_MASK_PIXELS {
            return Err(Error::upload(format!(
                "Image is too large for mask painting ({}x{}). Maximum is {} megapixels",
                natural.width,
                natural.height,
                MAX_MASK_PIXELS / (1024 * 1024)
            )));
        }
        let mut canvas = Self {
            raster: RgbaImage::new(natural.width, natural.height),
            history: Vec::new(),
            scale_x: 1.0,
            scale_y: 1.0,
            brush_size: DEFAULT_BRUSH_SIZE,
            active: None,
        };
        canvas.set_display_size(display_width, display_height)?;
        Ok(canvas)
    }

    /// Recomputes the scale factors after the preview was resized.
    pub fn set_display_size(&mut self, display_width: f32, display_height: f32) -> Result<()> {
        if !(display_width > 0.0 && display_height > 0.0)
            || !display_width.is_finite()
            || !display_height.is_finite()
        {
            return Err(Error::invalid_field(
                "mask",
                "display size must be positive",
            ));
        }
        self.scale_x = self.raster.width() as f32 / display_width;
        self.scale_y = self.raster.height() as f32 / display_height;
        Ok(())
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.raster.width(),
            height: self.raster.height(),
        }
    }

    pub fn scale(&self) -> (f32, f32) {
        (self.scale_x, self.scale_y)
    }

    pub fn brush_size(&self) -> u32 {
        self.brush_size
    }

    pub fn set_brush_size(&mut self, size: u32) {
        self.brush_size = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn is_drawing(&self) -> bool {
        self.active.is_some()
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn is_blank(&self) -> bool {
        self.raster.pixels().all(|p| p.0[3] == 0)
    }

    pub fn begin_stroke(&mut self, x: f32, y: f32) {
        if self.active.is_some() {
            self.end_stroke();
        }
        let point = self.to_natural(x, y);
        let before = self.raster.clone();
        self.stamp(point);
        self.active = Some(ActiveStroke {
            last: point,
            before,
        });
    }

    pub fn extend_stroke(&mut self, x: f32, y: f32) {
        let Some(last) = self.active.as_ref().map(|stroke| stroke.last) else {
            return;
        };
        let point = self.to_natural(x, y);
        self.segment(last, point);
        if let Some(stroke) = self.active.as_mut() {
            stroke.last = point;
        }
    }

    /// Finishes the stroke and records the pre-stroke raster for undo.
    pub fn end_stroke(&mut self) {
        if let Some(stroke) = self.active.take() {
            self.history.push(stroke.before);
            debug!("Mask stroke recorded ({} in history)", self.history.len());
        }
    }

    /// Paints a whole polyline as one undoable stroke.
    pub fn stroke(&mut self, points: &[(f32, f32)]) {
        let Some((&(x, y), rest)) = points.split_first() else {
            return;
        };
        self.begin_stroke(x, y);
        for &(x, y) in rest {
            self.extend_stroke(x, y);
        }
        self.end_stroke();
    }

    /// Returns false when there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.active = None;
        match self.history.pop() {
            Some(previous) => {
                self.raster = previous;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.history.clear();
        for pixel in self.raster.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.raster
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    pub fn to_data_uri(&self) -> Result<String> {
        Ok(DataUri::encode("image/png", &self.to_png()?))
    }

    /// Points are pinned to the raster plus one brush radius, so a wild
    /// coordinate cannot turn a segment into billions of stamps.
    fn to_natural(&self, x: f32, y: f32) -> (f32, f32) {
        let margin = self.radius();
        let pin = |value: f32, limit: u32| {
            if value.is_nan() {
                0.0
            } else {
                value.clamp(-margin, limit as f32 + margin)
            }
        };
        (
            pin(x * self.scale_x, self.raster.width()),
            pin(y * self.scale_y, self.raster.height()),
        )
    }

    fn radius(&self) -> f32 {
        (self.brush_size as f32 / 2.0).max(0.5)
    }

    fn segment(&mut self, from: (f32, f32), to: (f32, f32)) {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let steps = dx.hypot(dy).ceil().max(1.0) as u32;
        for step in 1..=steps {
            let t = step as f32 / steps as f32;
            self.stamp((from.0 + dx * t, from.1 + dy * t));
        }
    }

    /// Round brush tip centred on `center`.
    fn stamp(&mut self, center: (f32, f32)) {
        let radius = self.radius();
        let (width, height) = (self.raster.width() as i64, self.raster.height() as i64);

        let x0 = ((center.0 - radius).floor() as i64).max(0);
        let x1 = ((center.0 + radius).ceil() as i64).min(width - 1);
        let y0 = ((center.1 - radius).floor() as i64).max(0);
        let y1 = ((center.1 + radius).ceil() as i64).min(height - 1);

        for py in y0..=y1 {
            for px in x0..=x1 {
                let cx = px as f32 + 0.5 - center.0;
                let cy = py as f32 + 0.5 - center.1;
                if cx * cx + cy * cy <= radius * radius {
                    self.raster.put_pixel(px as u32, py as u32, STROKE);
                }
            }
        }
    }
}

impl std::fmt::Debug for MaskCanvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskCanvas")
            .field("dimensions", &self.dimensions())
            .field("scale", &self.scale())
            .field("brush_size", &self.brush_size)
            .field("history", &self.history.len())
            .finish()
    }
}
