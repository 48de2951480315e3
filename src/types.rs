/// Shared types used across the codebase

/// Write operations that run through the ownership manager.
/// Used as the label on retry logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Delete,
    Rate,
    Update,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create_cafe",
            Operation::Delete => "delete_cafe",
            Operation::Rate => "append_rating",
            Operation::Update => "update_cafe",
        }
    }
}
