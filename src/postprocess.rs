//! Deterministic pixel-art normalization of a raw render.
//!
//! The chain runs in a fixed order, each stage feeding the next:
//!
//! 1. drop transparency (RGB)
//! 2. 3x3 median filter
//! 3. posterize to 3 bits per channel
//! 4. contrast boost around the mean luminance
//! 5. nearest-neighbor downsample to the category's internal grid
//! 6. quantize to a small palette, re-adding alpha
//! 7. nearest-neighbor upsample to the output size
//!
//! Both resampling steps must stay nearest-neighbor: any interpolating filter
//! would bring back the gradients removed in step 3.

use std::collections::{BTreeMap, HashMap};

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};
use thiserror::Error;

use crate::catalog::Category;

/// Colors kept by the quantizer.
pub const PALETTE_SIZE: usize = 16;

const POSTERIZE_BITS: u8 = 3;
const CONTRAST_FACTOR: f32 = 1.4;

#[derive(Debug, Error)]
pub enum PostProcessError {
    #[error("input image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("invalid output resolution {0}")]
    InvalidResolution(u32),
}

#[derive(Debug, Clone)]
pub struct PostProcessor {
    palette_size: usize,
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self {
            palette_size: PALETTE_SIZE,
        }
    }
}

impl PostProcessor {
    pub fn with_palette_size(palette_size: usize) -> Self {
        Self {
            palette_size: palette_size.max(1),
        }
    }

    /// Normalize a decoded render into a `final_resolution` square asset.
    pub fn process(
        &self,
        raw: &DynamicImage,
        category: Category,
        final_resolution: u32,
    ) -> Result<RgbaImage, PostProcessError> {
        if raw.width() == 0 || raw.height() == 0 {
            return Err(PostProcessError::EmptyImage {
                width: raw.width(),
                height: raw.height(),
            });
        }
        if final_resolution == 0 {
            return Err(PostProcessError::InvalidResolution(final_resolution));
        }

        let rgb = raw.to_rgb8();
        let mut img = median_filter(&rgb);
        posterize(&mut img, POSTERIZE_BITS);
        contrast(&mut img, CONTRAST_FACTOR);

        let grid = category.internal_resolution();
        let small = imageops::resize(&img, grid, grid, FilterType::Nearest);
        let indexed = quantize(&small, self.palette_size);

        Ok(imageops::resize(
            &indexed,
            final_resolution,
            final_resolution,
            FilterType::Nearest,
        ))
    }
}

/// Per-channel 3x3 median with edge replication.
fn median_filter(src: &RgbImage) -> RgbImage {
    let (w, h) = src.dimensions();
    let max_x = w as i64 - 1;
    let max_y = h as i64 - 1;

    RgbImage::from_fn(w, h, |x, y| {
        let mut window = [[0u8; 9]; 3];
        let mut n = 0;
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let sx = (x as i64 + dx).clamp(0, max_x) as u32;
                let sy = (y as i64 + dy).clamp(0, max_y) as u32;
                let px = src.get_pixel(sx, sy);
                for c in 0..3 {
                    window[c][n] = px[c];
                }
                n += 1;
            }
        }
        let mut out = [0u8; 3];
        for c in 0..3 {
            window[c].sort_unstable();
            out[c] = window[c][4];
        }
        Rgb(out)
    })
}

/// Keep only the top `bits` bits of every channel.
fn posterize(img: &mut RgbImage, bits: u8) {
    let mask = !(u8::MAX >> bits);
    for px in img.pixels_mut() {
        for c in px.0.iter_mut() {
            *c &= mask;
        }
    }
}

/// Scale every channel away from the mean luminance by `factor`.
fn contrast(img: &mut RgbImage, factor: f32) {
    let n = u64::from(img.width()) * u64::from(img.height());
    if n == 0 {
        return;
    }
    let sum: u64 = img.pixels().map(|p| u64::from(luma(p))).sum();
    let mean = (sum as f64 / n as f64 + 0.5).floor() as f32;

    for px in img.pixels_mut() {
        for c in px.0.iter_mut() {
            let v = mean + factor * (f32::from(*c) - mean);
            *c = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// ITU-R 601-2 luma in 16-bit fixed point.
fn luma(p: &Rgb<u8>) -> u8 {
    let [r, g, b] = p.0;
    ((u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000) >> 16) as u8
}

/// A set of histogram entries that will become one palette color.
struct ColorBox {
    entries: Vec<([u8; 3], u32)>,
}

impl ColorBox {
    fn population(&self) -> u64 {
        self.entries.iter().map(|&(_, n)| u64::from(n)).sum()
    }

    /// Channel with the largest value range, and that range.
    fn widest_channel(&self) -> (usize, u8) {
        (0..3)
            .map(|c| {
                let (lo, hi) = self
                    .entries
                    .iter()
                    .fold((u8::MAX, u8::MIN), |(lo, hi), (color, _)| {
                        (lo.min(color[c]), hi.max(color[c]))
                    });
                (c, hi.saturating_sub(lo))
            })
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .unwrap_or((0, 0))
    }

    /// Population-weighted mean color.
    fn mean(&self) -> [u8; 3] {
        let total = self.population().max(1);
        let mut acc = [0u64; 3];
        for &(color, n) in &self.entries {
            for c in 0..3 {
                acc[c] += u64::from(color[c]) * u64::from(n);
            }
        }
        acc.map(|v| ((v + total / 2) / total) as u8)
    }

    /// Cut at the population median along the widest channel.
    fn split(mut self) -> (ColorBox, ColorBox) {
        let (channel, _) = self.widest_channel();
        self.entries
            .sort_unstable_by(|a, b| a.0[channel].cmp(&b.0[channel]).then(a.0.cmp(&b.0)));

        let total = self.population();
        let mut acc = 0u64;
        let mut cut = self.entries.len() / 2;
        for (i, &(_, n)) in self.entries.iter().enumerate() {
            acc += u64::from(n);
            if acc * 2 >= total {
                cut = i + 1;
                break;
            }
        }
        let cut = cut.clamp(1, self.entries.len() - 1);
        let upper = self.entries.split_off(cut);
        (self, ColorBox { entries: upper })
    }
}

/// Median-cut palette selection.
///
/// The box with the widest channel range is split first (ties go to the more
/// populous box), so small regions with distinct colors keep a palette entry
/// of their own instead of being averaged into the dominant colors.
fn build_palette(img: &RgbImage, colors: usize) -> Vec<[u8; 3]> {
    let mut histogram: BTreeMap<[u8; 3], u32> = BTreeMap::new();
    for px in img.pixels() {
        *histogram.entry(px.0).or_insert(0) += 1;
    }

    let mut boxes = vec![ColorBox {
        entries: histogram.into_iter().collect(),
    }];
    while boxes.len() < colors {
        let candidate = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.entries.len() > 1)
            .max_by(|(ia, a), (ib, b)| {
                a.widest_channel()
                    .1
                    .cmp(&b.widest_channel().1)
                    .then(a.population().cmp(&b.population()))
                    .then(ib.cmp(ia))
            })
            .map(|(i, _)| i);
        let Some(idx) = candidate else { break };
        let (lo, hi) = boxes.remove(idx).split();
        boxes.push(lo);
        boxes.push(hi);
    }

    boxes.iter().map(ColorBox::mean).collect()
}

/// Map every pixel to its nearest palette entry and add an opaque alpha channel.
fn quantize(img: &RgbImage, colors: usize) -> RgbaImage {
    let palette = build_palette(img, colors);
    let mut lookup: HashMap<[u8; 3], [u8; 3]> = HashMap::new();

    RgbaImage::from_fn(img.width(), img.height(), |x, y| {
        let src = img.get_pixel(x, y).0;
        let [r, g, b] = *lookup
            .entry(src)
            .or_insert_with(|| nearest(&palette, src));
        Rgba([r, g, b, u8::MAX])
    })
}

fn nearest(palette: &[[u8; 3]], color: [u8; 3]) -> [u8; 3] {
    let dist = |p: &[u8; 3]| -> i32 {
        (0..3)
            .map(|c| {
                let d = i32::from(p[c]) - i32::from(color[c]);
                d * d
            })
            .sum()
    };
    // min_by_key keeps the first of equal candidates.
    palette.iter().copied().min_by_key(|p| dist(p)).unwrap_or(color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, ImageReader};
    use std::collections::HashSet;
    use std::io::Cursor;

    fn noisy_gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([
                (x * 255 / w.max(1)) as u8,
                (y * 255 / h.max(1)) as u8,
                ((x * 7 + y * 13) % 256) as u8,
            ])
        }))
    }

    fn distinct_colors(img: &RgbaImage) -> usize {
        img.pixels().map(|p| p.0).collect::<HashSet<_>>().len()
    }

    #[test]
    fn output_matches_requested_resolution() {
        let pp = PostProcessor::default();
        for (w, h, res) in [(512, 512, 512), (300, 200, 256), (17, 1024, 768), (1, 1, 64)] {
            let out = pp.process(&noisy_gradient(w, h), Category::Default, res).unwrap();
            assert_eq!(out.dimensions(), (res, res), "input {w}x{h}");
        }
    }

    #[test]
    fn palette_is_bounded() {
        let pp = PostProcessor::default();
        for category in Category::ALL {
            let out = pp.process(&noisy_gradient(400, 400), category, 512).unwrap();
            assert!(distinct_colors(&out) <= PALETTE_SIZE, "{category}");
        }
    }

    #[test]
    fn custom_palette_size_is_respected() {
        let pp = PostProcessor::with_palette_size(4);
        let out = pp.process(&noisy_gradient(256, 256), Category::World, 256).unwrap();
        assert!(distinct_colors(&out) <= 4);
    }

    #[test]
    fn output_encodes_with_alpha() {
        let pp = PostProcessor::default();
        let out = pp.process(&noisy_gradient(64, 64), Category::Gem, 256).unwrap();
        assert!(out.pixels().all(|p| p[3] == 255));

        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(out)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        let decoded = ImageReader::new(Cursor::new(buf))
            .with_guessed_format()
            .unwrap()
            .decode()
            .unwrap();
        assert!(decoded.color().has_alpha());
        assert_eq!(decoded.dimensions(), (256, 256));
    }

    #[test]
    fn transparency_is_discarded() {
        let pp = PostProcessor::default();
        let input = DynamicImage::ImageRgba8(RgbaImage::from_pixel(32, 32, Rgba([200, 10, 10, 0])));
        let out = pp.process(&input, Category::Item, 64).unwrap();
        assert!(out.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn processing_is_deterministic() {
        let pp = PostProcessor::default();
        let input = noisy_gradient(333, 222);
        let a = pp.process(&input, Category::Slot, 512).unwrap();
        let b = pp.process(&input, Category::Slot, 512).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn blocks_follow_internal_grid() {
        // GEM renders on a 32px grid, so a 256px output is made of 8x8 blocks.
        let pp = PostProcessor::default();
        let out = pp.process(&noisy_gradient(256, 256), Category::Gem, 256).unwrap();
        for by in 0..32 {
            for bx in 0..32 {
                let first = out.get_pixel(bx * 8, by * 8);
                for dy in 0..8 {
                    for dx in 0..8 {
                        assert_eq!(out.get_pixel(bx * 8 + dx, by * 8 + dy), first);
                    }
                }
            }
        }
    }

    #[test]
    fn median_removes_isolated_pixel() {
        let mut img = RgbImage::from_pixel(5, 5, Rgb([0, 0, 0]));
        img.put_pixel(2, 2, Rgb([255, 255, 255]));
        let out = median_filter(&img);
        assert!(out.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn median_keeps_edges_of_large_regions() {
        let img = RgbImage::from_fn(6, 6, |x, _| if x < 3 { Rgb([0, 0, 0]) } else { Rgb([250, 250, 250]) });
        let out = median_filter(&img);
        assert_eq!(out.as_raw(), img.as_raw());
    }

    #[test]
    fn posterize_keeps_eight_levels() {
        let mut img = RgbImage::from_fn(256, 1, |x, _| Rgb([x as u8, 255 - x as u8, 37]));
        posterize(&mut img, 3);
        let levels: HashSet<u8> = img.pixels().map(|p| p[0]).collect();
        assert_eq!(levels.len(), 8);
        assert!(img.pixels().all(|p| p.0.iter().all(|v| v % 32 == 0)));
    }

    #[test]
    fn contrast_leaves_flat_image_alone() {
        let mut img = RgbImage::from_pixel(4, 4, Rgb([128, 128, 128]));
        contrast(&mut img, CONTRAST_FACTOR);
        assert!(img.pixels().all(|p| p.0 == [128, 128, 128]));
    }

    #[test]
    fn contrast_pushes_values_apart() {
        let mut img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([100, 100, 100]) } else { Rgb([160, 160, 160]) });
        contrast(&mut img, CONTRAST_FACTOR);
        // mean luminance is 130
        assert_eq!(img.get_pixel(0, 0).0, [88, 88, 88]);
        assert_eq!(img.get_pixel(1, 0).0, [172, 172, 172]);
    }

    #[test]
    fn quantize_preserves_small_palettes_exactly() {
        let colors = [[255, 0, 0], [0, 255, 0], [0, 0, 255], [10, 20, 30]];
        let img = RgbImage::from_fn(8, 8, |x, y| Rgb(colors[((x + y) % 4) as usize]));
        let out = quantize(&img, PALETTE_SIZE);
        for (x, y, px) in out.enumerate_pixels() {
            let [r, g, b, a] = px.0;
            assert_eq!([r, g, b], img.get_pixel(x, y).0);
            assert_eq!(a, 255);
        }
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let pp = PostProcessor::default();
        let err = pp.process(&noisy_gradient(8, 8), Category::Default, 0).unwrap_err();
        assert!(matches!(err, PostProcessError::InvalidResolution(0)));
    }
}
