use serde::{Deserialize, Serialize};

use super::message::{Message, NewMessage};

/// A stored conversation with its messages in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub timestamp: String,
    pub title: Option<String>,
    pub messages: Vec<Message>,
}

/// A conversation as submitted by the front end for saving.
///
/// `timestamp` defaults to the time of the save and `title` to the empty
/// string. An empty `messages` list leaves previously stored messages alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChat {
    pub id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<NewMessage>,
}
