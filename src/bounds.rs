use once_cell::sync::Lazy;
use regex::Regex;

// Node positions as emitted by the rendering engine. Only the translate
// form matters: layout places every node group with one.
static TRANSLATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"transform="translate\(\s*([\d.eE+-]+)\s*[,\s]\s*([\d.eE+-]+)\s*\)""#).unwrap()
});
static NODE_SIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?:width|height)="(\d+)""#).unwrap());
static VIEWBOX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"viewBox="[^"]*""#).unwrap());
static MAX_WIDTH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"max-width:\s*[\d.]+px;?").unwrap());

// Plausible node dimensions; anything outside is a canvas-level or
// degenerate declaration.
const NODE_SIZE_MIN: f64 = 10.0;
const NODE_SIZE_MAX: f64 = 800.0;
const NODE_WIDTH_FLOOR: f64 = 80.0;
const NODE_HEIGHT_FLOOR: f64 = 40.0;
const PAD_BASE: f64 = 30.0;

/// Recomputes the canvas bounds of rendered markup from the node positions
/// it carries. The engine's own declared viewBox is frequently wrong or
/// missing when measurements were synthetic; the emitted translate offsets
/// are what layout actually produced.
///
/// Operates on the markup as text. Only the first viewBox declaration is
/// replaced; every max-width style is.
pub fn fix_bounds(svg: &str) -> String {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for caps in TRANSLATE_RE.captures_iter(svg) {
        let (Ok(x), Ok(y)) = (caps[1].parse::<f64>(), caps[2].parse::<f64>()) else {
            continue;
        };
        if !x.is_finite() || !y.is_finite() {
            continue;
        }
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    // Nothing to correct: no node positions, or none parseable.
    if !min_x.is_finite() {
        return svg.to_string();
    }

    // Largest plausible node size, as a proxy for how much a node can
    // overhang its translate anchor.
    let mut max_node_w = NODE_WIDTH_FLOOR;
    let mut max_node_h = NODE_HEIGHT_FLOOR;
    for caps in NODE_SIZE_RE.captures_iter(svg) {
        let Ok(value) = caps[1].parse::<f64>() else {
            continue;
        };
        if value > NODE_SIZE_MIN && value < NODE_SIZE_MAX {
            if caps[0].starts_with("width") {
                max_node_w = max_node_w.max(value);
            } else {
                max_node_h = max_node_h.max(value);
            }
        }
    }

    let pad_x = max_node_w / 2.0 + PAD_BASE;
    let pad_y = max_node_h / 2.0 + PAD_BASE;
    let vb_x = min_x - pad_x;
    let vb_y = min_y - pad_y;
    let width = max_x - min_x + pad_x * 2.0;
    let height = max_y - min_y + pad_y * 2.0;

    let fixed = VIEWBOX_RE.replace(svg, format!(r#"viewBox="{vb_x} {vb_y} {width} {height}""#));
    let style_width = (width.ceil() + 50.0).max(300.0);
    MAX_WIDTH_RE
        .replace_all(&fixed, format!("max-width: {style_width}px;"))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(x: f64, y: f64) -> String {
        format!(r#"<g transform="translate({x}, {y})"><rect/></g>"#)
    }

    fn svg(body: &str) -> String {
        format!(r#"<svg viewBox="0 0 100 100" style="max-width: 100px;">{body}</svg>"#)
    }

    #[test]
    fn input_without_translates_is_returned_unchanged() {
        let markup = r#"<svg viewBox="0 0 12 12"><rect width="500"/></svg>"#;
        assert_eq!(fix_bounds(markup), markup);
    }

    #[test]
    fn single_node_still_receives_full_padding() {
        let markup = svg(&node(0.0, 0.0));
        let fixed = fix_bounds(&markup);
        // Default floors 80/40 give pad 70/50.
        assert!(fixed.contains(r#"viewBox="-70 -50 140 100""#), "got: {fixed}");
    }

    #[test]
    fn viewbox_spans_translate_extent() {
        let markup = svg(&format!("{}{}", node(0.0, 0.0), node(200.0, 120.0)));
        let fixed = fix_bounds(&markup);
        assert!(fixed.contains(r#"viewBox="-70 -50 340 220""#), "got: {fixed}");
    }

    #[test]
    fn node_sizes_widen_the_padding() {
        let markup = svg(&format!(
            r#"{}<rect width="200" height="100"/>"#,
            node(0.0, 0.0)
        ));
        let fixed = fix_bounds(&markup);
        // pad_x = 200/2 + 30, pad_y = 100/2 + 30.
        assert!(fixed.contains(r#"viewBox="-130 -80 260 160""#), "got: {fixed}");
    }

    #[test]
    fn sizes_outside_the_plausible_window_are_ignored() {
        let markup = svg(&format!(
            r#"{}<rect width="900" height="10"/>"#,
            node(0.0, 0.0)
        ));
        let fixed = fix_bounds(&markup);
        assert!(fixed.contains(r#"viewBox="-70 -50 140 100""#), "got: {fixed}");
    }

    #[test]
    fn max_width_styles_are_rewritten_everywhere() {
        let markup = format!(
            r#"<svg viewBox="0 0 1 1" style="max-width: 24.5px;">{}<g style="max-width: 7px"></g></svg>"#,
            node(0.0, 0.0)
        );
        let fixed = fix_bounds(&markup);
        // width 140 -> max(140 + 50, 300).
        assert_eq!(fixed.matches("max-width: 300px;").count(), 2, "got: {fixed}");
    }

    #[test]
    fn wide_diagrams_grow_the_max_width_style() {
        let markup = svg(&format!("{}{}", node(0.0, 0.0), node(400.0, 0.0)));
        let fixed = fix_bounds(&markup);
        // width = 400 + 140 = 540 -> 590px.
        assert!(fixed.contains("max-width: 590px;"), "got: {fixed}");
    }

    #[test]
    fn unparseable_offset_pairs_are_ignored() {
        let markup = svg(&format!(
            r#"<g transform="translate(e, 5.5.5)"></g>{}"#,
            node(10.0, 20.0)
        ));
        let fixed = fix_bounds(&markup);
        assert!(fixed.contains(r#"viewBox="-60 -30 140 100""#), "got: {fixed}");
    }

    #[test]
    fn only_unparseable_offsets_means_no_correction() {
        let markup = svg(r#"<g transform="translate(e, --)"></g>"#);
        assert_eq!(fix_bounds(&markup), markup);
    }

    #[test]
    fn missing_viewbox_is_a_harmless_noop_replace() {
        let markup = format!(r#"<svg style="max-width: 10px;">{}</svg>"#, node(0.0, 0.0));
        let fixed = fix_bounds(&markup);
        assert!(!fixed.contains("viewBox"));
        assert!(fixed.contains("max-width: 300px;"));
    }

    #[test]
    fn fix_bounds_is_a_fixed_point() {
        let markup = svg(&format!("{}{}", node(3.0, 4.0), node(80.0, 90.0)));
        let once = fix_bounds(&markup);
        let twice = fix_bounds(&once);
        assert_eq!(once, twice);
    }
}
