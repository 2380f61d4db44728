//! Raster rendering of the waveform surface.
//!
//! The backing pixmap is sized in device pixels (logical size times pixel
//! ratio). Every draw clears it, lays down the reference grid and then paints
//! one of three scenes: nothing, the synthetic demo wave, or decoded peaks
//! with a playhead.

use tiny_skia::{Color, Paint, PathBuilder, Pixmap, Stroke, Transform};

use super::demo::demo_amplitude;
use crate::peaks::PeakBuffer;

/// Horizontal bands of the reference grid (lines drawn between them).
const GRID_DIVISIONS: u32 = 6;
/// Bar half-height relative to surface height at amplitude 1.
const BAR_SCALE: f32 = 0.42;
/// Largest backing dimension we'll allocate, in device pixels.
const MAX_SURFACE_DIM: u32 = 8192;

/// Colours used on the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: Color,
    pub grid: Color,
    pub accent: Color,
    pub playhead: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Color::from_rgba8(31, 31, 38, 255),
            grid: Color::from_rgba8(221, 221, 221, 255),
            accent: Color::from_rgba8(22, 163, 74, 255),
            playhead: Color::from_rgba8(239, 68, 68, 255),
        }
    }
}

/// What to paint on top of the grid.
#[derive(Debug, Clone, Copy)]
pub enum Scene<'a> {
    /// Grid only.
    Blank,
    /// Synthetic wave at animation time `t_ms`.
    Demo { t_ms: f64 },
    Loaded {
        peaks: &'a PeakBuffer,
        current_time: f64,
        duration: f64,
    },
}

pub struct Renderer {
    /// `None` only when the backing store could not be allocated.
    pixmap: Option<Pixmap>,
    width: u32,
    height: u32,
    pixel_ratio: f32,
    palette: Palette,
    revision: u64,
}

impl Renderer {
    pub fn new(logical_width: f32, logical_height: f32, pixel_ratio: f32, palette: Palette) -> Self {
        let mut renderer = Self {
            pixmap: None,
            width: 0,
            height: 0,
            pixel_ratio: 1.0,
            palette,
            revision: 0,
        };
        renderer.allocate(logical_width, logical_height, pixel_ratio);
        renderer
    }

    /// Resize the backing store and redraw `scene` on it straight away.
    pub fn resize(
        &mut self,
        logical_width: f32,
        logical_height: f32,
        pixel_ratio: f32,
        scene: &Scene<'_>,
    ) {
        self.allocate(logical_width, logical_height, pixel_ratio);
        self.draw(scene);
    }

    fn allocate(&mut self, logical_width: f32, logical_height: f32, pixel_ratio: f32) {
        let pixel_ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        let width = device_pixels(logical_width, pixel_ratio);
        let height = device_pixels(logical_height, pixel_ratio);

        if self.pixmap.is_some() && width == self.width && height == self.height {
            self.pixel_ratio = pixel_ratio;
            return;
        }

        match Pixmap::new(width, height) {
            Some(pixmap) => {
                self.pixmap = Some(pixmap);
                self.width = width;
                self.height = height;
                self.pixel_ratio = pixel_ratio;
            }
            None => log::warn!("Could not allocate {width}x{height} waveform surface"),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Bumped on every draw; lets the host skip re-uploading unchanged frames.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    /// Straight (non-premultiplied) RGBA bytes of the current frame.
    pub fn rgba(&self) -> Vec<u8> {
        let Some(pixmap) = &self.pixmap else {
            return Vec::new();
        };
        pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect()
    }

    fn line_width(&self) -> f32 {
        self.pixel_ratio.floor().max(1.0)
    }

    pub fn draw(&mut self, scene: &Scene<'_>) {
        self.revision += 1;
        let line_width = self.line_width();
        let palette = self.palette;
        let Some(pixmap) = self.pixmap.as_mut() else {
            return;
        };

        pixmap.fill(palette.background);
        draw_grid(pixmap, palette.grid);

        match *scene {
            Scene::Blank => {}
            Scene::Demo { t_ms } => {
                let height = pixmap.height() as f32;
                let columns = (0..pixmap.width())
                    .map(|x| (x as f32, demo_amplitude(x as f32, t_ms) * BAR_SCALE * height));
                stroke_columns(pixmap, columns, palette.accent, 0.9, line_width);
            }
            Scene::Loaded {
                peaks,
                current_time,
                duration,
            } => {
                if peaks.len() < 2 {
                    return;
                }
                let width = pixmap.width();
                let height = pixmap.height() as f32;
                let values = peaks.as_slice();
                let columns = (0..width).map(|x| {
                    let p = values[column_index(x as usize, values.len(), width as usize)];
                    (x as f32, p * BAR_SCALE * height)
                });
                stroke_columns(pixmap, columns, palette.accent, 0.9, line_width);

                if let Some(x) = playhead_x(current_time, duration, width) {
                    draw_playhead(pixmap, x, palette.playhead, line_width);
                }
            }
        }
    }
}

fn device_pixels(logical: f32, pixel_ratio: f32) -> u32 {
    let pixels = (logical * pixel_ratio).floor();
    if pixels.is_finite() && pixels >= 1.0 {
        (pixels as u32).min(MAX_SURFACE_DIM)
    } else {
        1
    }
}

/// Peak index shown in column `x`.
///
/// Buffers wider than the surface are subsampled with an integer stride;
/// narrower ones repeat their last value.
pub fn column_index(x: usize, peak_count: usize, surface_width: usize) -> usize {
    let step = (peak_count / surface_width.max(1)).max(1);
    (x * step).min(peak_count.saturating_sub(1))
}

/// Horizontal centre of the playhead line, if there is a known duration.
pub fn playhead_x(current_time: f64, duration: f64, surface_width: u32) -> Option<f32> {
    if duration.is_nan() || duration <= 0.0 || !current_time.is_finite() {
        return None;
    }
    let fraction = current_time / duration;
    Some((fraction * surface_width as f64).floor() as f32 + 0.5)
}

fn paint_for(color: Color, opacity: f32) -> Paint<'static> {
    let mut color = color;
    color.apply_opacity(opacity);
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint
}

fn draw_grid(pixmap: &mut Pixmap, color: Color) {
    let width = pixmap.width() as f32;
    let height = pixmap.height() as f32;

    let mut pb = PathBuilder::new();
    for i in 1..GRID_DIVISIONS {
        let y = (height / GRID_DIVISIONS as f32 * i as f32).floor() + 0.5;
        pb.move_to(0.0, y);
        pb.line_to(width, y);
    }
    let Some(path) = pb.finish() else {
        return;
    };

    let stroke = Stroke {
        width: 1.0,
        ..Stroke::default()
    };
    pixmap.stroke_path(
        &path,
        &paint_for(color, 0.25),
        &stroke,
        Transform::identity(),
        None,
    );
}

/// One vertical bar per `(x, half_height)`, centred on the midline.
fn stroke_columns(
    pixmap: &mut Pixmap,
    columns: impl Iterator<Item = (f32, f32)>,
    color: Color,
    opacity: f32,
    line_width: f32,
) {
    let mid = pixmap.height() as f32 / 2.0;

    let mut pb = PathBuilder::new();
    for (x, half) in columns {
        if half <= 0.0 {
            continue;
        }
        pb.move_to(x + 0.5, mid - half);
        pb.line_to(x + 0.5, mid + half);
    }
    let Some(path) = pb.finish() else {
        return;
    };

    let stroke = Stroke {
        width: line_width,
        ..Stroke::default()
    };
    pixmap.stroke_path(
        &path,
        &paint_for(color, opacity),
        &stroke,
        Transform::identity(),
        None,
    );
}

fn draw_playhead(pixmap: &mut Pixmap, x: f32, color: Color, line_width: f32) {
    let height = pixmap.height() as f32;
    let mut pb = PathBuilder::new();
    pb.move_to(x, 0.0);
    pb.line_to(x, height);
    let Some(path) = pb.finish() else {
        return;
    };

    let stroke = Stroke {
        width: line_width,
        ..Stroke::default()
    };
    pixmap.stroke_path(
        &path,
        &paint_for(color, 0.7),
        &stroke,
        Transform::identity(),
        None,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(renderer: &Renderer, x: u32, y: u32) -> (u8, u8, u8) {
        let p = renderer.pixmap().unwrap().pixel(x, y).unwrap();
        (p.red(), p.green(), p.blue())
    }

    fn background() -> (u8, u8, u8) {
        (31, 31, 38)
    }

    fn is_accent((r, g, b): (u8, u8, u8)) -> bool {
        let (r, g, b) = (r as i32, g as i32, b as i32);
        g > r + 40 && g > b + 40
    }

    #[test]
    fn test_backing_store_uses_pixel_ratio() {
        let renderer = Renderer::new(400.0, 110.0, 2.0, Palette::default());
        assert_eq!((renderer.width(), renderer.height()), (800, 220));
        assert_eq!(renderer.line_width(), 2.0);

        let renderer = Renderer::new(333.3, 100.0, 1.5, Palette::default());
        assert_eq!((renderer.width(), renderer.height()), (499, 150));
    }

    #[test]
    fn test_degenerate_sizes_clamp() {
        let mut renderer = Renderer::new(800.0, 220.0, 1.0, Palette::default());
        renderer.resize(0.0, 0.0, f32::NAN, &Scene::Blank);
        assert_eq!((renderer.width(), renderer.height()), (1, 1));
        assert_eq!(renderer.pixel_ratio(), 1.0);
    }

    #[test]
    fn test_resize_redraws() {
        let mut renderer = Renderer::new(800.0, 220.0, 1.0, Palette::default());
        let before = renderer.revision();
        renderer.resize(640.0, 200.0, 1.0, &Scene::Blank);
        assert_eq!(renderer.revision(), before + 1);
        assert_eq!(renderer.width(), 640);
    }

    #[test]
    fn test_blank_scene_is_grid_only() {
        let mut renderer = Renderer::new(800.0, 220.0, 1.0, Palette::default());
        renderer.draw(&Scene::Blank);

        assert_eq!(rgb(&renderer, 100, 100), background());
        // First grid line sits at floor(220 / 6) = 36.
        assert_ne!(rgb(&renderer, 100, 36), background());
    }

    #[test]
    fn test_loaded_scene_draws_bars_and_playhead() {
        let peaks = PeakBuffer::compute(&vec![0.5; 8_000], 800);
        let mut renderer = Renderer::new(800.0, 220.0, 1.0, Palette::default());
        renderer.draw(&Scene::Loaded {
            peaks: &peaks,
            current_time: 60.0,
            duration: 120.0,
        });

        assert!(is_accent(rgb(&renderer, 100, 100)));
        assert_eq!(rgb(&renderer, 100, 5), background());

        let (r, g, _) = rgb(&renderer, 400, 5);
        assert!(r as i32 > g as i32 + 80, "playhead missing at column 400");
        assert_eq!(rgb(&renderer, 402, 5), background());
    }

    #[test]
    fn test_no_playhead_without_duration() {
        let peaks = PeakBuffer::compute(&vec![0.5; 8_000], 800);
        let mut renderer = Renderer::new(800.0, 220.0, 1.0, Palette::default());
        renderer.draw(&Scene::Loaded {
            peaks: &peaks,
            current_time: 0.0,
            duration: 0.0,
        });
        assert_eq!(rgb(&renderer, 0, 5), background());
        assert!(is_accent(rgb(&renderer, 0, 100)));
    }

    #[test]
    fn test_tiny_peak_buffer_draws_nothing() {
        let peaks = PeakBuffer::compute(&[1.0], 1);
        let mut renderer = Renderer::new(800.0, 220.0, 1.0, Palette::default());
        renderer.draw(&Scene::Loaded {
            peaks: &peaks,
            current_time: 1.0,
            duration: 2.0,
        });
        assert_eq!(rgb(&renderer, 0, 100), background());
        assert_eq!(rgb(&renderer, 400, 5), background());
    }

    #[test]
    fn test_demo_scene_draws_wave() {
        let mut renderer = Renderer::new(800.0, 220.0, 1.0, Palette::default());
        renderer.draw(&Scene::Demo { t_ms: 0.0 });
        // amplitude(40, 0) is about 0.88, well past row 100.
        assert!(is_accent(rgb(&renderer, 40, 100)));
        // amplitude(0, 0) is exactly zero.
        assert_eq!(rgb(&renderer, 0, 100), background());
    }

    #[test]
    fn test_playhead_position() {
        assert_eq!(playhead_x(60.0, 120.0, 800), Some(400.5));
        assert_eq!(playhead_x(0.0, 5.0, 800), Some(0.5));
        assert_eq!(playhead_x(1.0, 0.0, 800), None);
        assert_eq!(playhead_x(1.0, f64::NAN, 800), None);
    }

    #[test]
    fn test_column_stride() {
        // Buffer built for a wider surface is subsampled.
        assert_eq!(column_index(10, 1600, 800), 20);
        assert_eq!(column_index(799, 1600, 800), 1598);
        // Narrower buffer repeats its tail.
        assert_eq!(column_index(10, 800, 1600), 10);
        assert_eq!(column_index(1200, 800, 1600), 799);
        // Non-integer ratio truncates the stride.
        assert_eq!(column_index(3, 1000, 800), 3);
    }

    #[test]
    fn test_rgba_is_straight_alpha() {
        let mut renderer = Renderer::new(12.0, 12.0, 1.0, Palette::default());
        renderer.draw(&Scene::Blank);
        let bytes = renderer.rgba();
        assert_eq!(bytes.len(), 12 * 12 * 4);
        assert_eq!(&bytes[..4], &[31, 31, 38, 255]);
    }
}
