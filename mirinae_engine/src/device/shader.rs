/// Shader stages and SPIR-V sources
///
/// Shader byte code is an opaque input: passes ask a `ShaderProvider` for
/// the compiled module by name and hand the bytes to pipeline creation.

use std::path::PathBuf;
use crate::error::{Error, Result};

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

/// Compiled shader module handed to pipeline creation
#[derive(Debug, Clone)]
pub struct ShaderCode {
    pub stage: ShaderStage,
    /// SPIR-V byte code
    pub code: Vec<u8>,
    pub entry_point: String,
}

/// Source of compiled shader modules
pub trait ShaderProvider: Send + Sync {
    /// Load the module registered under `name` (e.g. "gbuf_basic.vert")
    fn load(&self, name: &str) -> Result<Vec<u8>>;

    /// Load `name` and wrap it for the given stage with a `main` entry point
    fn shader(&self, name: &str, stage: ShaderStage) -> Result<ShaderCode> {
        Ok(ShaderCode {
            stage,
            code: self.load(name)?,
            entry_point: "main".to_string(),
        })
    }
}

/// Loads `<dir>/<name>.spv` from disk
#[derive(Debug, Clone)]
pub struct FileShaderProvider {
    dir: PathBuf,
}

impl FileShaderProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ShaderProvider for FileShaderProvider {
    fn load(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.dir.join(format!("{}.spv", name));
        std::fs::read(&path).map_err(|e| {
            crate::engine_error!("mirinae::Shader", "Failed to read {}: {}", path.display(), e);
            Error::InvalidResource(format!("shader '{}': {}", name, e))
        })
    }
}
