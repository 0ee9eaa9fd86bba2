pub mod mock;
pub mod openai;
pub mod reliable;

pub use mock::{MockProvider, MockResponse};
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use reliable::{ReliableConfig, ReliableProvider};
