pub mod analysis;
pub mod job;
pub mod pricing;
pub mod recommendation;
pub mod style;
