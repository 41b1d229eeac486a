pub mod engine;

pub use engine::Flattener;
