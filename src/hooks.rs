use crate::dom::{Document, HookTable};
use crate::geometry;

/// Attaches the estimator's three measurement operations to both prototype
/// levels of the document. Natively provided slots are left alone, and
/// installing twice is a no-op.
pub fn install_measurement_hooks(document: &mut Document) {
    install(document.svg_hooks_mut());
    install(document.element_hooks_mut());
}

fn install(table: &mut HookTable) {
    if table.bounding_box.is_none() {
        table.bounding_box = Some(geometry::estimate);
    }
    if table.text_width.is_none() {
        table.text_width = Some(geometry::measured_text_width);
    }
    if table.screen_rect.is_none() {
        table.screen_rect = Some(geometry::screen_rect);
    }
}
