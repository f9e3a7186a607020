pub mod image_path;
pub mod process_killer;

pub use image_path::*;
pub use process_killer::*;
