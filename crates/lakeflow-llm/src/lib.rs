pub mod client;
pub mod retry;

pub use client::OpenAiClient;
pub use retry::RetryingGenerator;
