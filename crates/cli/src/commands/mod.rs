pub mod score;
pub mod usage;
