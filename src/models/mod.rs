pub mod chat;
pub mod message;

pub use chat::{Chat, NewChat};
pub use message::{Message, NewMessage};
