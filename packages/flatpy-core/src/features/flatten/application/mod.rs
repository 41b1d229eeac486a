pub mod flatten_usecase;

pub use flatten_usecase::{fetch_func_name, FlattenUseCase, FlattenedCallable};
