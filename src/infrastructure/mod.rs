// Infrastructure implementations for Kernelize.

pub mod c_frontend;
pub mod config;
pub mod json_source;
pub mod printer;
pub mod sink;

use std::path::Path;

use clap::ValueEnum;

pub use c_frontend::CFrontend;
pub use config::{Config, EmitFormat};
pub use json_source::JsonTreeSource;
pub use printer::{IrPrinter, JsonPrinter};
pub use sink::{MemorySink, StderrSink};

use crate::error::{KernelizeError, Result};
use crate::ports::{TreePrinter, TreeSource};

/// How the input file is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Pick by file extension.
    #[default]
    Auto,
    /// A generic tree serialized as JSON.
    Json,
    /// Unpreprocessed C source (best effort: macro uses must parse as C
    /// expressions; use a JSON tree for type operands and list loops).
    C,
}

impl InputFormat {
    /// Resolve `Auto` against the file extension.
    pub fn resolve(self, path: &Path) -> Result<InputFormat> {
        if self != InputFormat::Auto {
            return Ok(self);
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(InputFormat::Json),
            Some("c") | Some("h") => Ok(InputFormat::C),
            _ => Err(KernelizeError::UnsupportedInput {
                path: path.to_path_buf(),
            }),
        }
    }
}

pub fn source_for(format: InputFormat, path: &Path) -> Result<Box<dyn TreeSource>> {
    Ok(match format.resolve(path)? {
        InputFormat::C => Box::new(CFrontend),
        InputFormat::Json | InputFormat::Auto => Box::new(JsonTreeSource),
    })
}

pub fn printer_for(emit: EmitFormat) -> Option<Box<dyn TreePrinter>> {
    match emit {
        EmitFormat::Ir => Some(Box::new(IrPrinter)),
        EmitFormat::Json => Some(Box::new(JsonPrinter)),
        EmitFormat::None => None,
    }
}
