pub mod check;
pub mod plan;
pub mod render;
pub mod serve;
