use serde::{Deserialize, Serialize};

/// A pixel coordinate in the natural resolution of the edited image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotPoint {
    pub x: u32,
    pub y: u32,
}

impl HotspotPoint {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Ordered set of points marking where a localized edit applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditHotspot {
    points: Vec<HotspotPoint>,
}

impl EditHotspot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: HotspotPoint) {
        self.points.push(point);
    }

    /// Removes the most recently placed point.
    pub fn pop(&mut self) -> Option<HotspotPoint> {
        self.points.pop()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn points(&self) -> &[HotspotPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Maps a point on a scaled display of the image back to natural pixels.
///
/// Returns `None` when either size is degenerate or the point falls outside
/// the displayed area. Results are clamped to the last valid pixel.
pub fn scale_to_natural(
    displayed: (f64, f64),
    displayed_size: (f64, f64),
    natural_size: (u32, u32),
) -> Option<HotspotPoint> {
    let (x, y) = displayed;
    let (display_w, display_h) = displayed_size;
    let (natural_w, natural_h) = natural_size;
    if display_w <= 0.0 || display_h <= 0.0 || natural_w == 0 || natural_h == 0 {
        return None;
    }
    if !(0.0..=display_w).contains(&x) || !(0.0..=display_h).contains(&y) {
        return None;
    }
    let scale_x = natural_w as f64 / display_w;
    let scale_y = natural_h as f64 / display_h;
    let natural_x = ((x * scale_x).round() as u32).min(natural_w - 1);
    let natural_y = ((y * scale_y).round() as u32).min(natural_h - 1);
    Some(HotspotPoint::new(natural_x, natural_y))
}

/// Parses `"x,y"` (whitespace tolerated) into a pair of floats.
pub fn parse_point(raw: &str) -> Option<(f64, f64)> {
    let (x, y) = raw.split_once(',')?;
    let x = x.trim().parse::<f64>().ok()?;
    let y = y.trim().parse::<f64>().ok()?;
    (x.is_finite() && y.is_finite()).then_some((x, y))
}

/// Parses `"WxH"` into a pair of floats.
pub fn parse_size(raw: &str) -> Option<(f64, f64)> {
    let (w, h) = raw.trim().to_ascii_lowercase().split_once('x').map(|(w, h)| {
        (w.trim().to_string(), h.trim().to_string())
    })?;
    let w = w.parse::<f64>().ok()?;
    let h = h.parse::<f64>().ok()?;
    (w > 0.0 && h > 0.0).then_some((w, h))
}
