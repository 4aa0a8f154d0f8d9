pub mod config;
pub mod tokens;
pub mod splitter;
pub mod cache;
pub mod compress;
pub mod python;
pub mod traceback;
pub mod allocator;
pub mod scanner;
pub mod hierarchy;
pub mod summary;
pub mod document;
pub mod pipeline;
