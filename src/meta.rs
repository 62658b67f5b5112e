use serde::{Deserialize, Serialize};

/// Identity of a parsed response: the message id and the model that actually
/// served it.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Meta {
    pub id: String,
    pub model: String,
}

impl Meta {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
        }
    }
}
