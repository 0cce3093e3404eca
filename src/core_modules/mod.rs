pub mod background;
pub mod burrow;
pub mod burrow_mask;
pub mod chunk;
pub mod connectivity;
pub mod disjoint_set;
pub mod geometry;
pub mod ground;
pub mod tracker;
