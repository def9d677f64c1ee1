mod bounding_box;
mod coordinate;

pub use bounding_box::BoundingBox2D;
pub use coordinate::Coordinate2D;
