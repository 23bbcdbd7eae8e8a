use std::fs;
use std::path::Path;

use tracing::debug;

use crate::domain::ast::AstNode;
use crate::error::{KernelizeError, Result};
use crate::ports::TreeSource;

/// Reads a generic tree serialized as JSON by an external frontend.
pub struct JsonTreeSource;

impl JsonTreeSource {
    pub fn parse(&self, text: &str, path: &Path) -> Result<AstNode> {
        let tree: AstNode = serde_json::from_str(text).map_err(|source| KernelizeError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(nodes = tree.count(), "json tree loaded");
        Ok(tree)
    }
}

impl TreeSource for JsonTreeSource {
    fn load(&self, path: &Path) -> Result<AstNode> {
        let text = fs::read_to_string(path).map_err(|source| KernelizeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse(&text, path)
    }
}
