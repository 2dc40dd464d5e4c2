pub mod plantation;
pub mod scale;
pub mod ward;

pub use plantation::{PlantationSite, parse_plantation_points};
pub use scale::{ColorBreakpoints, ColorScale, ScaleMode, rgb_css, rgba_css};
pub use ward::*;
