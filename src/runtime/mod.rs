pub mod config;
pub mod frame;
pub mod runtime_error;
pub mod vm;
