use crate::dom::{Element, ElementKind};
use once_cell::sync::Lazy;
use regex::Regex;

// Width per character as a fraction of the font size. Calibrated against
// browser output for the default mermaid font stack; good enough for layout,
// not for typography.
const TEXT_WIDTH_FACTOR: f64 = 0.6;
const MIN_TEXT_WIDTH: f64 = 10.0;
const DEFAULT_FONT_SIZE: f64 = 16.0;
const FALLBACK_CHAR_WIDTH: f64 = 9.0;
const FALLBACK_MIN_WIDTH: f64 = 20.0;
const FALLBACK_HEIGHT: f64 = 20.0;

static TRANSLATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"translate\(\s*([\d.eE+-]+)\s*[,\s]\s*([\d.eE+-]+)\s*\)").unwrap());

/// Axis-aligned box in the element's local coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 && self.height <= 0.0
    }
}

/// A bounding box carrying its edges, standing in for real screen-space
/// measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub top: f64,
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
}

impl From<BoundingBox> for ScreenRect {
    fn from(bbox: BoundingBox) -> Self {
        Self {
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
            top: bbox.y,
            left: bbox.x,
            right: bbox.x + bbox.width,
            bottom: bbox.y + bbox.height,
        }
    }
}

/// Box estimation capability for one element kind. Implementations must be
/// total: the rendering engine cannot tolerate a measurement failure
/// mid-layout, so every rule degrades to a default instead of erroring.
pub trait Measurable {
    fn bounding_box(&self, element: &Element) -> BoundingBox;
}

/// Estimated bounding box for any element. Always finite, never negative in
/// width or height, never fails.
pub fn estimate(element: &Element) -> BoundingBox {
    sanitize(measurer_for(element.kind()).bounding_box(element))
}

/// Estimated rendered text width: character count scaled by font size. Used
/// where the engine wants a bare width rather than a full box; no floor is
/// applied here.
pub fn measured_text_width(element: &Element) -> f64 {
    let font_size = element.attr_f64("font-size", DEFAULT_FONT_SIZE);
    let count = element.text_content().chars().count() as f64;
    let width = count * font_size * TEXT_WIDTH_FACTOR;
    if width.is_finite() { width.max(0.0) } else { 0.0 }
}

/// The estimator's box reinterpreted with screen-space edges.
pub fn screen_rect(element: &Element) -> ScreenRect {
    ScreenRect::from(estimate(element))
}

fn measurer_for(kind: ElementKind) -> &'static dyn Measurable {
    match kind {
        ElementKind::Rect => &RectMeasure,
        ElementKind::Circle => &CircleMeasure,
        ElementKind::Line => &LineMeasure,
        ElementKind::Text => &TextMeasure,
        ElementKind::ForeignObject => &ForeignObjectMeasure,
        ElementKind::Group | ElementKind::Svg => &ContainerMeasure,
        ElementKind::Style | ElementKind::Defs | ElementKind::Marker | ElementKind::Other => {
            &FallbackMeasure
        }
    }
}

fn sanitize(bbox: BoundingBox) -> BoundingBox {
    BoundingBox {
        x: finite_or_zero(bbox.x),
        y: finite_or_zero(bbox.y),
        width: finite_or_zero(bbox.width).max(0.0),
        height: finite_or_zero(bbox.height).max(0.0),
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

struct RectMeasure;

impl Measurable for RectMeasure {
    fn bounding_box(&self, element: &Element) -> BoundingBox {
        BoundingBox {
            x: element.attr_f64("x", 0.0),
            y: element.attr_f64("y", 0.0),
            width: element.attr_f64("width", 0.0),
            height: element.attr_f64("height", 0.0),
        }
    }
}

struct CircleMeasure;

impl Measurable for CircleMeasure {
    fn bounding_box(&self, element: &Element) -> BoundingBox {
        let cx = element.attr_f64("cx", 0.0);
        let cy = element.attr_f64("cy", 0.0);
        let r = element.attr_f64("r", 0.0);
        BoundingBox {
            x: cx - r,
            y: cy - r,
            width: r * 2.0,
            height: r * 2.0,
        }
    }
}

struct LineMeasure;

impl Measurable for LineMeasure {
    fn bounding_box(&self, element: &Element) -> BoundingBox {
        let x1 = element.attr_f64("x1", 0.0);
        let y1 = element.attr_f64("y1", 0.0);
        let x2 = element.attr_f64("x2", 0.0);
        let y2 = element.attr_f64("y2", 0.0);
        BoundingBox {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }
}

struct TextMeasure;

impl Measurable for TextMeasure {
    fn bounding_box(&self, element: &Element) -> BoundingBox {
        let font_size = element.attr_f64("font-size", DEFAULT_FONT_SIZE);
        let count = element.text_content().chars().count() as f64;
        let width = count * font_size * TEXT_WIDTH_FACTOR;
        // Baseline-relative placement: the box extends one font size above
        // the anchor point.
        BoundingBox {
            x: 0.0,
            y: -font_size,
            width: width.max(MIN_TEXT_WIDTH),
            height: font_size,
        }
    }
}

struct ForeignObjectMeasure;

impl Measurable for ForeignObjectMeasure {
    fn bounding_box(&self, element: &Element) -> BoundingBox {
        BoundingBox {
            x: element.attr_f64("x", 0.0),
            y: element.attr_f64("y", 0.0),
            width: element.attr_f64("width", 100.0),
            height: element.attr_f64("height", 20.0),
        }
    }
}

struct ContainerMeasure;

impl Measurable for ContainerMeasure {
    fn bounding_box(&self, element: &Element) -> BoundingBox {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let mut found = false;

        for child in element.children() {
            if child.kind().is_metadata() {
                continue;
            }
            let child_box = estimate(child);
            if child_box.is_empty() {
                continue;
            }
            let (tx, ty) = translate_offset(child);
            min_x = min_x.min(child_box.x + tx);
            min_y = min_y.min(child_box.y + ty);
            max_x = max_x.max(child_box.x + tx + child_box.width);
            max_y = max_y.max(child_box.y + ty + child_box.height);
            found = true;
        }

        if found && min_x.is_finite() {
            return BoundingBox {
                x: min_x,
                y: min_y,
                width: max_x - min_x,
                height: max_y - min_y,
            };
        }

        FallbackMeasure.bounding_box(element)
    }
}

struct FallbackMeasure;

impl Measurable for FallbackMeasure {
    fn bounding_box(&self, element: &Element) -> BoundingBox {
        let count = element.text_content().chars().count() as f64;
        BoundingBox {
            x: 0.0,
            y: 0.0,
            width: (count * FALLBACK_CHAR_WIDTH).max(FALLBACK_MIN_WIDTH),
            height: FALLBACK_HEIGHT,
        }
    }
}

fn translate_offset(element: &Element) -> (f64, f64) {
    let Some(transform) = element.attr("transform") else {
        return (0.0, 0.0);
    };
    let Some(caps) = TRANSLATE_RE.captures(transform) else {
        return (0.0, 0.0);
    };
    let tx = caps[1].parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0);
    let ty = caps[2].parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0);
    (tx, ty)
}
