use serde::Serialize;

/// Success envelope returned by every workflow operation.
///
/// `warnings` lists secondary side effects that failed after the primary mutation committed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowOutcome<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T> WorkflowOutcome<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}
