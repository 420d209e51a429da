pub mod bounding_box;
pub mod curve2d;
pub mod curves;
pub mod intersection;
pub mod point;
pub mod surface_intersection;
pub mod surfaces;
pub mod vector;
