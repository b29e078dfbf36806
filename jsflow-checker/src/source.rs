use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::ast::Program;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Yaml,
}

impl SourceFormat {
    /// `.yaml` and `.yml` files are YAML; everything else is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some("yaml" | "yml") => SourceFormat::Yaml,
            _ => SourceFormat::Json,
        }
    }
}

/// A serialized input: a program, an externs program or a configuration.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub contents: String,
}

impl SourceFile {
    pub fn new(path: PathBuf, contents: String) -> Self {
        let format = SourceFormat::from_path(&path);
        Self {
            path,
            format,
            contents,
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::new(path.to_path_buf(), contents))
    }

    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        match self.format {
            SourceFormat::Json => serde_json::from_str(&self.contents)
                .with_context(|| format!("failed to parse {} as JSON", self.path.display())),
            SourceFormat::Yaml => serde_yaml::from_str(&self.contents)
                .with_context(|| format!("failed to parse {} as YAML", self.path.display())),
        }
    }
}

pub fn load_program(path: &Path) -> Result<Program> {
    SourceFile::read(path)?.parse()
}
