//! Frame-differencing motion detector.
//!
//! Pipeline: luminance diff against the previous frame, threshold, dilate,
//! count foreground pixels, then extract contours for bounding boxes.
//! Grounded in the original `stream_manager.py`'s OpenCV pipeline
//! (`absdiff` → `threshold` → `dilate` → `findContours`); `image` +
//! `imageproc` are the idiomatic Rust stand-ins for those same steps.

use image::{GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::morphology::dilate;
use imageproc::distance_transform::Norm;

/// An axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> f64 {
        (self.width as f64) * (self.height as f64)
    }
}

const DIFF_THRESHOLD: u8 = 30;
const DILATE_ITERATIONS: u8 = 2;
/// `Norm::LInf` at this radius covers a 5x5 neighborhood per iteration.
const DILATE_RADIUS: u8 = 2;
const MAX_CONTOURS: usize = 10;

/// Result of one motion-detection pass.
pub struct MotionResult {
    pub foreground_pixels: u32,
    pub boxes: Vec<BoundingBox>,
}

/// Compares `curr` against `prev` and, if the foreground pixel count
/// exceeds `motion_threshold`, extracts up to 10 bounding boxes for
/// contours whose bounding-box area exceeds `contour_min_area`.
///
/// Returns `None` when foreground pixels are at or below
/// `motion_threshold` — no motion event should be emitted.
pub fn detect_motion(
    prev: &GrayImage,
    curr: &GrayImage,
    motion_threshold: u32,
    contour_min_area: f64,
) -> Option<MotionResult> {
    let mask = diff_mask(prev, curr);
    let dilated = dilate_n(&mask, DILATE_ITERATIONS);
    let foreground_pixels = dilated.pixels().filter(|p| p.0[0] > 0).count() as u32;

    if foreground_pixels <= motion_threshold {
        return None;
    }

    let contours = find_contours::<i32>(&dilated);
    let mut boxes: Vec<BoundingBox> = contours
        .iter()
        .filter_map(|contour| bounding_box(&contour.points))
        .filter(|bbox| bbox.area() > contour_min_area)
        .take(MAX_CONTOURS)
        .collect();
    boxes.truncate(MAX_CONTOURS);

    Some(MotionResult {
        foreground_pixels,
        boxes,
    })
}

fn diff_mask(prev: &GrayImage, curr: &GrayImage) -> GrayImage {
    let (width, height) = curr.dimensions();
    let mut mask = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let prev_px = prev.get_pixel_checked(x, y).map(|p| p.0[0]).unwrap_or(0);
            let curr_px = curr.get_pixel(x, y).0[0];
            let diff = prev_px.abs_diff(curr_px);
            let value = if diff > DIFF_THRESHOLD { 255 } else { 0 };
            mask.put_pixel(x, y, Luma([value]));
        }
    }
    mask
}

fn dilate_n(mask: &GrayImage, iterations: u8) -> GrayImage {
    let mut result = mask.clone();
    for _ in 0..iterations {
        result = dilate(&result, Norm::LInf, DILATE_RADIUS);
    }
    result
}

fn bounding_box(points: &[imageproc::point::Point<i32>]) -> Option<BoundingBox> {
    if points.is_empty() {
        return None;
    }
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;
    Some(BoundingBox {
        x: min_x.max(0) as u32,
        y: min_y.max(0) as u32,
        width: (max_x - min_x).max(0) as u32,
        height: (max_y - min_y).max(0) as u32,
    })
}

#[cfg(test)]
mod tests {
    include!("motion_test.rs");
}
