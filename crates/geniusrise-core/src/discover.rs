//! Finds spout packages under a directory and describes the spouts they export.
//!
//! A directory is a package when it holds a `package.toml` manifest:
//!
//! ```toml
//! name = "files"
//! exports = ["LocalFileSpout"]
//! ```
//!
//! Each export must name a type linked into the binary. Exports that are
//! spouts become [`ComponentDescriptor`]s; anything else is ignored.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::catalog::{Catalog, TypeInfo, SPOUT_BASE};
use crate::error::{DiscoveryError, ModuleLoadError};
use crate::introspect::inspect_constructor;
use crate::schema::ParameterSchema;
use crate::spout::MethodInfo;

pub const PACKAGE_MARKER: &str = "package.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exports: Vec<String>,
}

/// What to do when a package fails to load or introspect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanPolicy {
    /// Fail the whole scan on the first broken package.
    #[default]
    Abort,
    /// Record a warning and keep scanning sibling packages.
    SkipAndWarn,
}

#[derive(Debug, Clone)]
pub struct ComponentDescriptor {
    pub name: String,
    pub component_type: TypeInfo,
    pub init_schema: ParameterSchema,
    /// Package directory the component was exported from.
    pub package: PathBuf,
}

impl ComponentDescriptor {
    pub fn methods(&self) -> &'static [MethodInfo] {
        self.component_type.methods
    }
}

/// Equal when name and schema match; the package path is where it was found, not what it is.
impl PartialEq for ComponentDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.component_type.name == other.component_type.name
            && self.init_schema == other.init_schema
    }
}

#[derive(Debug)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub error: DiscoveryError,
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub components: IndexMap<String, ComponentDescriptor>,
    pub warnings: Vec<ScanWarning>,
}

impl ScanResult {
    pub fn get(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.components.get(name)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Discoverer<'a> {
    catalog: &'a Catalog,
    base: String,
    policy: ScanPolicy,
}

impl<'a> Discoverer<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            base: SPOUT_BASE.to_string(),
            policy: ScanPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ScanPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Select subtypes of `base` instead of spouts.
    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    pub fn scan(&self, root: &Path) -> Result<ScanResult, DiscoveryError> {
        if !root.is_dir() {
            return Err(DiscoveryError::MissingRoot(root.to_path_buf()));
        }

        let mut result = ScanResult::default();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    self.handle_failure(&mut result, path, e.into())?;
                    continue;
                }
            };
            if !entry.file_type().is_dir() || !entry.path().join(PACKAGE_MARKER).is_file() {
                continue;
            }

            match self.load_package(entry.path()) {
                Ok(descriptors) => {
                    for descriptor in descriptors {
                        insert_descriptor(&mut result.components, descriptor);
                    }
                }
                Err(e) => self.handle_failure(&mut result, entry.path().to_path_buf(), e)?,
            }
        }

        tracing::info!(
            root = %root.display(),
            components = result.components.len(),
            warnings = result.warnings.len(),
            "scanned spouts directory"
        );
        Ok(result)
    }

    /// Load one package directory and describe the components it exports.
    pub fn load_package(&self, dir: &Path) -> Result<Vec<ComponentDescriptor>, DiscoveryError> {
        let manifest_path = dir.join(PACKAGE_MARKER);
        let manifest = read_manifest(&manifest_path)?;

        let mut descriptors = Vec::new();
        for export in &manifest.exports {
            let info = self
                .catalog
                .get(export)
                .ok_or_else(|| ModuleLoadError::UnresolvedExport {
                    path: manifest_path.clone(),
                    name: export.clone(),
                })?;

            if info.name == self.base || !self.catalog.is_subtype(info.name, &self.base) {
                tracing::debug!(export = %export, package = %dir.display(), "export is not a component");
                continue;
            }

            let init_schema =
                inspect_constructor(self.catalog, info.name).map_err(|source| {
                    DiscoveryError::Introspection {
                        name: export.clone(),
                        package: dir.to_path_buf(),
                        source,
                    }
                })?;
            descriptors.push(ComponentDescriptor {
                name: info.name.to_string(),
                component_type: *info,
                init_schema,
                package: dir.to_path_buf(),
            });
        }

        tracing::debug!(
            package = manifest.name.as_deref().unwrap_or_default(),
            path = %dir.display(),
            components = descriptors.len(),
            "loaded package"
        );
        Ok(descriptors)
    }

    fn handle_failure(
        &self,
        result: &mut ScanResult,
        path: PathBuf,
        error: DiscoveryError,
    ) -> Result<(), DiscoveryError> {
        match self.policy {
            ScanPolicy::Abort => Err(error),
            ScanPolicy::SkipAndWarn => {
                tracing::warn!(path = %path.display(), error = %error, "skipping broken package");
                result.warnings.push(ScanWarning { path, error });
                Ok(())
            }
        }
    }
}

fn read_manifest(path: &Path) -> Result<PackageManifest, ModuleLoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| ModuleLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ModuleLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn insert_descriptor(
    components: &mut IndexMap<String, ComponentDescriptor>,
    descriptor: ComponentDescriptor,
) {
    let package = descriptor.package.clone();
    if let Some(previous) = components.insert(descriptor.name.clone(), descriptor) {
        tracing::warn!(
            name = %previous.name,
            replaced = %previous.package.display(),
            by = %package.display(),
            "component name collision, last discovered wins"
        );
    }
}
