//! Static screening of submitted source
//!
//! A conservative substring scan against constructs that could reach outside
//! the sandbox (process spawning, reflection, raw filesystem or network
//! access, unbounded parallelism). It knowingly rejects safe code that merely
//! mentions a token in a comment or string literal; the container's
//! network-none/cap-drop/resource-cap configuration is the actual security
//! boundary, and this filter is a defense-in-depth layer in front of it.

use crate::errors::EngineError;

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "System.exit",
    "Runtime.getRuntime",
    "ProcessBuilder",
    "java.io.File",
    "java.nio.file",
    "java.net",
    "java.lang.reflect",
    "sun.misc.Unsafe",
    "Thread",
    "ForkJoinPool",
];

#[derive(Debug, Clone)]
pub struct CodeValidator {
    keywords: Vec<&'static str>,
}

impl Default for CodeValidator {
    fn default() -> Self {
        Self {
            keywords: FORBIDDEN_KEYWORDS.to_vec(),
        }
    }
}

impl CodeValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// First match wins; the violating keyword is reported back to the user.
    pub fn validate(&self, source: &str) -> Result<(), EngineError> {
        for keyword in &self.keywords {
            if source.contains(keyword) {
                return Err(EngineError::SecurityViolation((*keyword).to_string()));
            }
        }
        Ok(())
    }
}
