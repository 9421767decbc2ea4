pub mod gemini;
pub mod image;
pub mod style;
pub mod suggestion;

pub use gemini::*;
pub use image::*;
pub use style::*;
pub use suggestion::*;
