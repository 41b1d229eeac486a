pub mod interpreter;
pub mod temp_code;
