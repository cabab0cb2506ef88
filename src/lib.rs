pub mod bounds;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dom;
pub mod engine;
pub mod geometry;
pub mod hooks;
pub mod protocol;

pub use bounds::fix_bounds;
pub use config::{ServiceConfig, Theme, load_config};
pub use dom::{Document, Element, ElementKind};
pub use engine::{CommandEngine, DiagramEngine, EngineConfig, EngineError};
pub use geometry::{BoundingBox, ScreenRect, estimate, measured_text_width, screen_rect};
pub use hooks::install_measurement_hooks;
pub use protocol::Service;

#[cfg(feature = "cli")]
pub use cli::run;
