pub mod annotations;
pub mod document;
pub mod layers;
pub mod properties;
pub mod resolver;

pub use annotations::{
    parse_annotation_key, parse_trait_option, split_property_path, PathSegment,
    TRAIT_ANNOTATION_PREFIX,
};
pub use document::{
    parse_document, validate_document, CamelCatalogSpec, DocumentError, IntegrationDocument,
    IntegrationPhase, IntegrationSpec, KitSpec, PlatformSpec, Profile, TraitSpecs,
};
pub use layers::{document_layers, CapabilityConfig, ConfigLayer, LayerSnapshot, PropertyEntry};
pub use properties::{DecodeError, Properties, PropertyKind, PropertyMap, PropertySpec};
pub use resolver::{ConfigResolver, SchemaSource};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while resolving the layered trait configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("wrong format for trait annotation {0:?}: missing trait ID")]
    MalformedAnnotation(String),

    #[error("wrong format for trait option {0:?}: expected <trait>.<property>=<value>")]
    MalformedOption(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Errors for file I/O operations (separate from pure parsing errors)
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Document error: {0}")]
    DocumentError(#[from] DocumentError),
}

// ============================================================================
// SBIO: I/O wrapper - thin layer over pure functions
// ============================================================================

/// Load and parse an integration document from disk.
/// This is the I/O boundary - it reads the file and delegates to pure parsing functions.
pub fn load_document_file(path: &Path) -> Result<IntegrationDocument, LoadError> {
    let path = expand_path(path);
    let content = std::fs::read_to_string(&path).map_err(|source| LoadError::IoError {
        path: path.clone(),
        source,
    })?;
    Ok(parse_document(&content)?)
}

/// Load platform defaults from a YAML/JSON file holding a bare `PlatformSpec`
pub fn load_platform_file(path: &Path) -> Result<PlatformSpec, LoadError> {
    let path = expand_path(path);
    let content = std::fs::read_to_string(&path).map_err(|source| LoadError::IoError {
        path: path.clone(),
        source,
    })?;
    serde_yaml::from_str(&content)
        .map_err(|e| LoadError::DocumentError(DocumentError::ParseError(e.to_string())))
}

/// Default location of the user's platform defaults (`~/.kamel/platform.yaml`)
pub fn default_platform_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kamel").join("platform.yaml"))
}

/// Fill in the platform section from the user's defaults when the document
/// has none and the file exists.
pub fn apply_platform_defaults(
    document: &mut IntegrationDocument,
    path: Option<&Path>,
) -> Result<(), LoadError> {
    if document.platform.is_some() {
        return Ok(());
    }
    let path = match path {
        Some(p) => expand_path(p),
        None => match default_platform_path() {
            Some(p) => p,
            None => return Ok(()),
        },
    };
    if !path.exists() {
        return Ok(());
    }
    tracing::debug!("Loading platform defaults from {}", path.display());
    document.platform = Some(load_platform_file(&path)?);
    Ok(())
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}
