use crate::geometry::{BoundingBox, ScreenRect};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

// Attribute values coming out of the rendering engine are CSS-flavored
// ("16px", "50%"), so numeric parsing takes the leading number and drops
// the rest, like a browser would.
static LEADING_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").unwrap());

pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let matched = LEADING_NUMBER_RE.find(raw.trim())?;
    matched.as_str().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// The closed set of element kinds the geometry estimator distinguishes.
/// Anything outside it measures through the generic fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Rect,
    Circle,
    Line,
    Text,
    ForeignObject,
    Group,
    Svg,
    Style,
    Defs,
    Marker,
    Other,
}

impl ElementKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "rect" => Self::Rect,
            "circle" => Self::Circle,
            "line" => Self::Line,
            "text" | "tspan" => Self::Text,
            "foreignobject" => Self::ForeignObject,
            "g" => Self::Group,
            "svg" => Self::Svg,
            "style" => Self::Style,
            "defs" => Self::Defs,
            "marker" => Self::Marker,
            _ => Self::Other,
        }
    }

    /// Style/defs/marker subtrees carry no visible geometry of their own.
    pub fn is_metadata(self) -> bool {
        matches!(self, Self::Style | Self::Defs | Self::Marker)
    }
}

/// One node of the synthetic document tree. Children are exclusively owned;
/// the whole subtree lives and dies with the body of one render call.
#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    kind: ElementKind,
    attrs: BTreeMap<String, String>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let kind = ElementKind::from_tag(&tag);
        Self {
            tag,
            kind,
            attrs: BTreeMap::new(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    /// Numeric attribute with a per-kind default for absent or unparseable
    /// values; never fails.
    pub fn attr_f64(&self, name: &str, default: f64) -> f64 {
        self.attr(name).and_then(parse_number).unwrap_or(default)
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn append_child(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Own text followed by every descendant's, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.collect_text(out);
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.append_child(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }
}

pub type BoxHook = fn(&Element) -> BoundingBox;
pub type TextWidthHook = fn(&Element) -> f64;
pub type ScreenRectHook = fn(&Element) -> ScreenRect;

/// One prototype level's measurement slots. A `None` slot means the level
/// provides no native implementation of that operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookTable {
    pub bounding_box: Option<BoxHook>,
    pub text_width: Option<TextWidthHook>,
    pub screen_rect: Option<ScreenRectHook>,
}

/// In-process substitute for a browser page: a body subtree reset between
/// renders, plus the two prototype levels measurement operations attach to.
#[derive(Debug)]
pub struct Document {
    body: Element,
    svg_hooks: HookTable,
    element_hooks: HookTable,
}

impl Document {
    pub fn new() -> Self {
        Self {
            body: container(),
            svg_hooks: HookTable::default(),
            element_hooks: HookTable::default(),
        }
    }

    pub fn body(&self) -> &Element {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Element {
        &mut self.body
    }

    /// Drops whatever the previous render attached and starts from a clean
    /// container.
    pub fn reset_body(&mut self) {
        self.body = container();
    }

    pub fn svg_hooks(&self) -> &HookTable {
        &self.svg_hooks
    }

    pub fn svg_hooks_mut(&mut self) -> &mut HookTable {
        &mut self.svg_hooks
    }

    pub fn element_hooks(&self) -> &HookTable {
        &self.element_hooks
    }

    pub fn element_hooks_mut(&mut self) -> &mut HookTable {
        &mut self.element_hooks
    }

    /// Resolves through the graphic-specific level first, then the generic
    /// one. `None` until hooks are installed.
    pub fn bounding_box(&self, element: &Element) -> Option<BoundingBox> {
        self.svg_hooks
            .bounding_box
            .or(self.element_hooks.bounding_box)
            .map(|hook| hook(element))
    }

    pub fn text_width(&self, element: &Element) -> Option<f64> {
        self.svg_hooks
            .text_width
            .or(self.element_hooks.text_width)
            .map(|hook| hook(element))
    }

    pub fn screen_rect(&self, element: &Element) -> Option<ScreenRect> {
        self.svg_hooks
            .screen_rect
            .or(self.element_hooks.screen_rect)
            .map(|hook| hook(element))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn container() -> Element {
    Element::new("div").with_attr("id", "container")
}
