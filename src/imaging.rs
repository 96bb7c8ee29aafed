use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{DynamicImage, ImageFormat, ImageReader, ImageResult, Rgba, RgbaImage};
use once_cell::sync::Lazy;
use std::{io::Cursor, sync::Arc};
use tokio::{
    sync::Semaphore,
    task::{self, JoinError},
};

// размер по умолчанию, если заголовок картинки не читается
const DEFAULT_SIDE: u32 = 1000;

const LABEL_OPACITY: f32 = 0.7;
const LABEL_CORNER_RADIUS: f64 = 4.0;
const GLYPH_WIDTH_RATIO: f64 = 0.6;

pub const LABELED_EXT: &str = "png";
pub const LABELED_CONTENT_TYPE: &str = "image/png";

// CPU-тяжёлая работа не должна съедать весь blocking-пул
static BLOCKING_SEM: Lazy<Arc<Semaphore>> =
    Lazy::new(|| Arc::new(Semaphore::new(std::cmp::max(2, num_cpus::get() / 2))));

/// Runs `f` on the blocking pool, at most `max(2, cpus/2)` at a time.
pub async fn run_blocking<T, F>(f: F) -> Result<T, JoinError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let permit = BLOCKING_SEM.clone().acquire_owned().await.ok();
    task::spawn_blocking(move || {
        let _permit = permit;
        f()
    })
    .await
}

/// Content type for a stored file extension.
pub fn content_type_for_ext(ext: &str) -> String {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg".into(),
        "png" => "image/png".into(),
        "gif" => "image/gif".into(),
        "tif" | "tiff" => "image/tiff".into(),
        "webp" => "image/webp".into(),
        "" => "application/octet-stream".into(),
        other => format!("image/{other}"),
    }
}

/// Width/height from the image header, 1000x1000 if it cannot be read.
pub fn image_dimensions(bytes: &[u8]) -> (u32, u32) {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|r| r.into_dimensions().ok())
        .unwrap_or((DEFAULT_SIDE, DEFAULT_SIDE))
}

/// Placement of the name label for an image of a given size.
///
/// Everything is anchored to the bottom-right margin: the box's right and
/// bottom edges sit on `(anchor_x, anchor_y)`. The text width is an estimate
/// (`chars * font_size * 0.6`), not real glyph metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelGeometry {
    pub font_size: u32,
    pub padding: u32,
    pub anchor_x: i64,
    pub anchor_y: i64,
    pub text_width: f64,
    pub box_height: u32,
}

impl LabelGeometry {
    pub fn new(width: u32, height: u32, name: &str) -> Self {
        let font_size = ((width as f64 * 0.02).floor() as u32).clamp(24, 72);
        let padding = ((font_size as f64 * 0.3).floor() as u32).max(6);
        let margin = ((width as f64 * 0.01).floor() as u32).max(10);
        let text_width = name.chars().count() as f64 * font_size as f64 * GLYPH_WIDTH_RATIO;
        Self {
            font_size,
            padding,
            anchor_x: width as i64 - margin as i64,
            anchor_y: height as i64 - margin as i64,
            text_width,
            box_height: font_size + 2 * padding,
        }
    }

    /// `(x, y, w, h)` of the background box.
    pub fn box_rect(&self) -> (f64, f64, f64, f64) {
        let pad2 = 2.0 * self.padding as f64;
        (
            self.anchor_x as f64 - self.text_width - pad2,
            (self.anchor_y - self.box_height as i64) as f64,
            self.text_width + pad2,
            self.box_height as f64,
        )
    }

    fn glyph_width(&self) -> f64 {
        self.font_size as f64 * GLYPH_WIDTH_RATIO
    }
}

/// Composites the name label onto `bytes` and re-encodes as PNG.
pub fn label_image(bytes: &[u8], name: &str) -> ImageResult<Vec<u8>> {
    let (w, h) = image_dimensions(bytes);
    let geometry = LabelGeometry::new(w, h, name);

    let mut canvas = image::load_from_memory(bytes)?.to_rgba8();
    draw_box(&mut canvas, &geometry);
    draw_text(&mut canvas, &geometry, name);

    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(canvas).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

fn inside_rounded(px: f64, py: f64, (x, y, w, h): (f64, f64, f64, f64), r: f64) -> bool {
    if px < x || py < y || px > x + w || py > y + h {
        return false;
    }
    let r = r.min(w / 2.0).min(h / 2.0);
    // ближайший центр скругления
    let cx = px.clamp(x + r, x + w - r);
    let cy = py.clamp(y + r, y + h - r);
    let (dx, dy) = (px - cx, py - cy);
    dx * dx + dy * dy <= r * r
}

/// Pixel range `[lo, hi)` covering `[from, to)`, clipped to `0..limit`.
fn pixel_span(from: f64, to: f64, limit: u32) -> std::ops::Range<u32> {
    let lo = from.floor().max(0.0) as u32;
    let hi = (to.ceil().max(0.0) as u32).min(limit);
    lo.min(hi)..hi
}

fn draw_box(canvas: &mut RgbaImage, g: &LabelGeometry) {
    let rect = g.box_rect();
    let (x, y, w, h) = rect;
    let keep = 1.0 - LABEL_OPACITY;
    for py in pixel_span(y, y + h, canvas.height()) {
        for px in pixel_span(x, x + w, canvas.width()) {
            if !inside_rounded(px as f64 + 0.5, py as f64 + 0.5, rect, LABEL_CORNER_RADIUS) {
                continue;
            }
            let Rgba([r, gr, b, a]) = *canvas.get_pixel(px, py);
            let out_a = LABEL_OPACITY * 255.0 + a as f32 * keep;
            canvas.put_pixel(
                px,
                py,
                Rgba([
                    (r as f32 * keep).round() as u8,
                    (gr as f32 * keep).round() as u8,
                    (b as f32 * keep).round() as u8,
                    out_a.round().min(255.0) as u8,
                ]),
            );
        }
    }
}

fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

fn glyph_bit(rows: &[u8; 8], col: i64, row: i64) -> bool {
    if !(0..8).contains(&col) || !(0..8).contains(&row) {
        return false;
    }
    rows[row as usize] & (1 << col) != 0
}

// 8x8 bitmap, растянутый на ячейку glyph_width x font_size; жирность — сдвоенный столбец
fn draw_text(canvas: &mut RgbaImage, g: &LabelGeometry, name: &str) {
    let white = Rgba([255, 255, 255, 255]);
    let cell_w = g.glyph_width();
    let cell_h = g.font_size as f64;
    let top = (g.anchor_y - g.font_size as i64) as f64;
    let left = g.anchor_x as f64 - g.text_width;

    for (i, c) in name.chars().enumerate() {
        let rows = glyph(c);
        let x0 = left + i as f64 * cell_w;
        for py in pixel_span(top, top + cell_h, canvas.height()) {
            let row = ((py as f64 + 0.5 - top) / cell_h * 8.0).floor() as i64;
            for px in pixel_span(x0, x0 + cell_w, canvas.width()) {
                let col = ((px as f64 + 0.5 - x0) / cell_w * 8.0).floor() as i64;
                if glyph_bit(&rows, col, row) || glyph_bit(&rows, col - 1, row) {
                    canvas.put_pixel(px, py, white);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([200, 180, 40]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn jpeg(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([10, 120, 240]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    #[test]
    fn font_size_scales_with_width_and_clamps() {
        assert_eq!(LabelGeometry::new(2000, 1500, "x").font_size, 40);
        assert_eq!(LabelGeometry::new(100, 100, "x").font_size, 24);
        assert_eq!(LabelGeometry::new(10000, 100, "x").font_size, 72);
    }

    #[test]
    fn geometry_for_2000_wide() {
        let g = LabelGeometry::new(2000, 1000, "Jane");
        assert_eq!(g.padding, 12);
        // margin = floor(2000 * 0.01) = 20
        assert_eq!((g.anchor_x, g.anchor_y), (1980, 980));
        assert_eq!(g.text_width, 4.0 * 40.0 * 0.6);
        assert_eq!(g.box_height, 64);
        let (x, y, w, h) = g.box_rect();
        assert_eq!(x + w, 1980.0);
        assert_eq!(y + h, 980.0);
        assert_eq!(w, 96.0 + 24.0);
        assert_eq!(h, 64.0);
    }

    #[test]
    fn padding_and_margin_have_floors() {
        let g = LabelGeometry::new(100, 80, "ab");
        assert_eq!(g.padding, 7); // floor(24 * 0.3)
        // margin floors at 10
        assert_eq!((g.anchor_x, g.anchor_y), (90, 70));
    }

    #[test]
    fn dimensions_fall_back_to_default() {
        assert_eq!(image_dimensions(b"definitely not an image"), (1000, 1000));
        assert_eq!(image_dimensions(&png(37, 21)), (37, 21));
    }

    #[test]
    fn label_outputs_png_of_same_size() {
        let src = jpeg(320, 240);
        let first = label_image(&src, "O'Brien #1").unwrap();
        let second = label_image(&src, "O'Brien #1").unwrap();

        for out in [&first, &second] {
            assert_eq!(image::guess_format(out).unwrap(), ImageFormat::Png);
            assert_eq!(image_dimensions(out), (320, 240));
        }
    }

    #[test]
    fn label_darkens_corner_and_leaves_top_left() {
        let src = png(400, 300);
        let out = image::load_from_memory(&label_image(&src, "Jane").unwrap())
            .unwrap()
            .to_rgba8();
        let g = LabelGeometry::new(400, 300, "Jane");
        let (x, y, _, _) = g.box_rect();

        // inside the box but left of the text: dimmed background only
        let inside = out.get_pixel(x as u32 + 5, y as u32 + 5);
        assert_eq!(inside.0, [60, 54, 12, 255]);
        assert_eq!(out.get_pixel(0, 0).0, [200, 180, 40, 255]);

        // some text pixels are white
        let any_white = (y as u32..g.anchor_y as u32)
            .flat_map(|py| (x as u32..g.anchor_x as u32).map(move |px| (px, py)))
            .any(|(px, py)| out.get_pixel(px, py).0 == [255, 255, 255, 255]);
        assert!(any_white);
    }

    #[test]
    fn label_on_tiny_image_does_not_panic() {
        let out = label_image(&png(8, 8), "A very long member name").unwrap();
        assert_eq!(image_dimensions(&out), (8, 8));
    }

    #[test]
    fn label_rejects_garbage() {
        assert!(label_image(b"garbage", "x").is_err());
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for_ext("JPG"), "image/jpeg");
        assert_eq!(content_type_for_ext("png"), "image/png");
        assert_eq!(content_type_for_ext("heic"), "image/heic");
    }

    #[tokio::test]
    async fn run_blocking_returns_value() {
        assert_eq!(run_blocking(|| 2 + 2).await.unwrap(), 4);
    }
}
