pub mod all;
pub mod mask;
pub mod peaks;
pub mod report;
pub mod segment;
