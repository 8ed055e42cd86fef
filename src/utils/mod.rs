pub mod image;
pub mod messages;

pub use image::ImageProcessor;
