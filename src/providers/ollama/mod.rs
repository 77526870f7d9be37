pub mod adapter;
pub mod models;
pub mod stream;

pub use adapter::OllamaProvider;
