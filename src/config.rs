use crate::security::PolicyMode;

/// Construction-time settings for an [`Interpreter`](crate::Interpreter).
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Nested method/block invocations allowed before `SystemStackError`.
    pub max_call_depth: usize,
    pub policy_mode: PolicyMode,
    pub allowed_types: Vec<String>,
    pub allowed_namespaces: Vec<String>,
    /// Route `puts`/`print`/`p` into a buffer read by `take_output`.
    pub capture_output: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 10_000,
            policy_mode: PolicyMode::Unrestricted,
            allowed_types: Vec::new(),
            allowed_namespaces: Vec::new(),
            capture_output: false,
        }
    }
}

impl InterpreterConfig {
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_policy_mode(mut self, mode: PolicyMode) -> Self {
        self.policy_mode = mode;
        self
    }

    pub fn allow_type(mut self, name: impl Into<String>) -> Self {
        self.allowed_types.push(name.into());
        self
    }

    pub fn allow_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.allowed_namespaces.push(namespace.into());
        self
    }

    pub fn with_captured_output(mut self) -> Self {
        self.capture_output = true;
        self
    }
}
