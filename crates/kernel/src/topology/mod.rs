pub mod primitives;
pub mod shape;
