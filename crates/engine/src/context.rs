use uuid::Uuid;

/// Per-request correlation state, passed explicitly to every operation.
///
/// Background work spawned on behalf of a request (sibling indexing) carries a
/// clone, so its log lines share the request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    request_id: String,
}

impl Context {
    /// A context with a freshly generated request id.
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// A context carrying a caller-supplied request id.
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
