pub mod chat;
pub mod composer;
pub mod embedder;
pub mod retriever;

pub use chat::AzureChatModel;
pub use composer::AnswerComposer;
pub use embedder::AzureOpenAiEmbedder;
pub use retriever::{AzureSearchRetriever, Retriever};
