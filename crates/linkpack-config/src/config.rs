// crates/linkpack-config/src/config.rs
// ============================================================================
// Module: Linkpack Configuration
// Description: Configuration loading and validation for linkpack.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: linkpack-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every field has a default, so an empty file is valid; invalid values fail
//! closed before any pipeline work starts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use linkpack_core::BuildToolSettings;
use linkpack_core::CacheSettings;
use linkpack_core::LayoutSettings;
use linkpack_core::PipelineSettings;
use linkpack_core::PolicySettings;
use linkpack_core::settings::DEFAULT_BUILD_PROGRAM;
use linkpack_core::settings::DEFAULT_DESCRIPTOR_FILE;
use linkpack_core::settings::DEFAULT_LOCKFILE_NAME;
use linkpack_core::settings::DEFAULT_MANIFEST_FILE;
use linkpack_core::settings::DEFAULT_NATIVE_DIR;
use linkpack_core::settings::DEFAULT_NATIVE_PACKAGE;
use linkpack_core::settings::DEFAULT_PACK_TASK;
use linkpack_core::settings::DEFAULT_PACKAGES_DIR;
use linkpack_core::settings::DEFAULT_PRIMARY_PACKAGE;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "linkpack.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "LINKPACK_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a package name.
pub(crate) const MAX_PACKAGE_NAME_LENGTH: usize = 214;
/// Maximum number of build tool arguments per list.
pub(crate) const MAX_TOOL_ARGS: usize = 32;
/// Maximum allowed pack concurrency.
pub(crate) const MAX_CONCURRENCY: usize = 256;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Linkpack configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkpackConfig {
    /// Repository layout configuration.
    #[serde(default)]
    pub layout: LayoutConfig,
    /// Build tool configuration.
    #[serde(default)]
    pub build_tool: BuildToolConfig,
    /// Package policy configuration.
    #[serde(default)]
    pub policies: PoliciesConfig,
    /// Artifact cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl LinkpackConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::parse(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        self.build_tool.validate()?;
        self.policies.validate()?;
        self.cache.validate()?;
        Ok(())
    }

    /// Converts the configuration into pipeline settings.
    #[must_use]
    pub fn into_settings(self) -> PipelineSettings {
        let defaults = CacheSettings::default();
        PipelineSettings {
            layout: LayoutSettings {
                packages_dir: self.layout.packages_dir,
                manifest_file: self.layout.manifest_file,
                descriptor_file: self.layout.descriptor_file,
                lockfile_name: self.layout.lockfile_name,
            },
            build_tool: BuildToolSettings {
                program: self.build_tool.program,
                pack_args: self.build_tool.pack_args,
                run_args: self.build_tool.run_args,
                task: self.build_tool.task,
                max_concurrency: self.build_tool.max_concurrency,
            },
            policies: PolicySettings {
                native_package: self.policies.native_package,
                primary_package: self.policies.primary_package,
                native_dir: self.policies.native_dir,
            },
            cache: CacheSettings {
                root: self.cache.root.unwrap_or(defaults.root),
                build_cache_dir: self.cache.build_cache_dir,
            },
        }
    }
}

/// Repository layout configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    /// Package container directory relative to the repository root.
    #[serde(default = "default_packages_dir")]
    pub packages_dir: String,
    /// Manifest file name.
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
    /// Build-pipeline descriptor file name.
    #[serde(default = "default_descriptor_file")]
    pub descriptor_file: String,
    /// Lockfile placeholder file name.
    #[serde(default = "default_lockfile_name")]
    pub lockfile_name: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            packages_dir: default_packages_dir(),
            manifest_file: default_manifest_file(),
            descriptor_file: default_descriptor_file(),
            lockfile_name: default_lockfile_name(),
        }
    }
}

impl LayoutConfig {
    /// Validates layout names.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("layout.packages_dir", &self.packages_dir)?;
        if Path::new(self.packages_dir.trim()).is_absolute() {
            return Err(ConfigError::Invalid("layout.packages_dir must be relative".to_string()));
        }
        validate_file_name("layout.manifest_file", &self.manifest_file)?;
        validate_file_name("layout.descriptor_file", &self.descriptor_file)?;
        validate_file_name("layout.lockfile_name", &self.lockfile_name)?;
        Ok(())
    }
}

/// Build tool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildToolConfig {
    /// Build tool executable.
    #[serde(default = "default_build_program")]
    pub program: String,
    /// Arguments placed before the artifact path in the pack script.
    #[serde(default = "default_pack_args")]
    pub pack_args: Vec<String>,
    /// Arguments placed before the task name when running the pack task.
    #[serde(default = "default_run_args")]
    pub run_args: Vec<String>,
    /// Pack task and script name.
    #[serde(default = "default_pack_task")]
    pub task: String,
    /// Optional bound on concurrent pack invocations.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

impl Default for BuildToolConfig {
    fn default() -> Self {
        Self {
            program: default_build_program(),
            pack_args: default_pack_args(),
            run_args: default_run_args(),
            task: default_pack_task(),
            max_concurrency: None,
        }
    }
}

impl BuildToolConfig {
    /// Validates build tool settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("build_tool.program", &self.program)?;
        let task = self.task.trim();
        if task.is_empty() {
            return Err(ConfigError::Invalid("build_tool.task must be non-empty".to_string()));
        }
        if task.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "build_tool.task must not contain whitespace".to_string(),
            ));
        }
        let arg_lists =
            [("build_tool.pack_args", &self.pack_args), ("build_tool.run_args", &self.run_args)];
        for (field, args) in arg_lists {
            if args.len() > MAX_TOOL_ARGS {
                return Err(ConfigError::Invalid(format!("{field} has too many entries")));
            }
            if args.iter().any(|arg| arg.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!("{field} entries must be non-empty")));
            }
        }
        match self.max_concurrency {
            Some(0) => Err(ConfigError::Invalid(
                "build_tool.max_concurrency must be greater than zero".to_string(),
            )),
            Some(limit) if limit > MAX_CONCURRENCY => Err(ConfigError::Invalid(format!(
                "build_tool.max_concurrency must be at most {MAX_CONCURRENCY}"
            ))),
            _ => Ok(()),
        }
    }
}

/// Package policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PoliciesConfig {
    /// Package shipping native binaries.
    #[serde(default = "default_native_package")]
    pub native_package: String,
    /// Primary framework package.
    #[serde(default = "default_primary_package")]
    pub primary_package: String,
    /// Native binary subdirectory name.
    #[serde(default = "default_native_dir")]
    pub native_dir: String,
}

impl Default for PoliciesConfig {
    fn default() -> Self {
        Self {
            native_package: default_native_package(),
            primary_package: default_primary_package(),
            native_dir: default_native_dir(),
        }
    }
}

impl PoliciesConfig {
    /// Validates policy names.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_package_name("policies.native_package", &self.native_package)?;
        validate_package_name("policies.primary_package", &self.primary_package)?;
        if self.native_package == self.primary_package {
            return Err(ConfigError::Invalid(
                "policies.native_package and policies.primary_package must differ".to_string(),
            ));
        }
        validate_file_name("policies.native_dir", &self.native_dir)
    }
}

/// Artifact cache configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    /// Directory receiving packed artifacts (defaults under the temp dir).
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Shared build cache directory (defaults under the cache root).
    #[serde(default)]
    pub build_cache_dir: Option<PathBuf>,
}

impl CacheConfig {
    /// Validates cache paths.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(root) = &self.root {
            validate_path_string("cache.root", &root.to_string_lossy())?;
        }
        if let Some(dir) = &self.build_cache_dir {
            validate_path_string("cache.build_cache_dir", &dir.to_string_lossy())?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a bare file name (exactly one normal path component).
fn validate_file_name(field: &str, value: &str) -> Result<(), ConfigError> {
    validate_path_string(field, value)?;
    let mut components = Path::new(value.trim()).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ConfigError::Invalid(format!("{field} must be a single file name"))),
    }
}

/// Validates a package name used to select policies.
fn validate_package_name(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.len() > MAX_PACKAGE_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if value.contains(char::is_whitespace) {
        return Err(ConfigError::Invalid(format!("{field} must not contain whitespace")));
    }
    Ok(())
}

/// Default package container directory.
fn default_packages_dir() -> String {
    DEFAULT_PACKAGES_DIR.to_string()
}

/// Default manifest file name.
fn default_manifest_file() -> String {
    DEFAULT_MANIFEST_FILE.to_string()
}

/// Default descriptor file name.
fn default_descriptor_file() -> String {
    DEFAULT_DESCRIPTOR_FILE.to_string()
}

/// Default lockfile placeholder name.
fn default_lockfile_name() -> String {
    DEFAULT_LOCKFILE_NAME.to_string()
}

/// Default build tool executable.
fn default_build_program() -> String {
    DEFAULT_BUILD_PROGRAM.to_string()
}

/// Default pack script arguments.
fn default_pack_args() -> Vec<String> {
    BuildToolSettings::default().pack_args
}

/// Default pack task run arguments.
fn default_run_args() -> Vec<String> {
    BuildToolSettings::default().run_args
}

/// Default pack task name.
fn default_pack_task() -> String {
    DEFAULT_PACK_TASK.to_string()
}

/// Default native-binary package name.
fn default_native_package() -> String {
    DEFAULT_NATIVE_PACKAGE.to_string()
}

/// Default primary framework package name.
fn default_primary_package() -> String {
    DEFAULT_PRIMARY_PACKAGE.to_string()
}

/// Default native binary directory name.
fn default_native_dir() -> String {
    DEFAULT_NATIVE_DIR.to_string()
}
