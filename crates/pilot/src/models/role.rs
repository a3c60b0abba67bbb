use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Carries the results of the tool calls made in the preceding assistant turn
    Tool,
}

impl Role {
    /// The role that carries this message on a backend without a tool role
    pub fn is_user_side(&self) -> bool {
        matches!(self, Role::User | Role::Tool)
    }
}
