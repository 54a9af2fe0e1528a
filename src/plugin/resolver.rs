//! Mapping node type tags to plugin library paths.
//!
//! Resolution never touches the filesystem: unknown tags resolve to a path
//! like any other and fail later when the library is opened.

use std::path::{Path, PathBuf};

/// Platform family whose dynamic-library naming convention applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// `lib<name>.so`
    Linux,
    /// `lib<name>.dylib`
    MacOs,
    /// `<name>.dll`
    Windows,
}

impl Platform {
    /// The platform this binary was built for.
    pub const fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_vendor = "apple") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Library naming convention for this platform.
    pub const fn naming(self) -> LibraryNaming {
        match self {
            Platform::Linux => LibraryNaming::new("lib", ".so"),
            Platform::MacOs => LibraryNaming::new("lib", ".dylib"),
            Platform::Windows => LibraryNaming::new("", ".dll"),
        }
    }
}

/// File-name prefix and suffix wrapped around a type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryNaming {
    /// Prefix before the tag.
    pub prefix: &'static str,
    /// Suffix after the tag, including the dot.
    pub suffix: &'static str,
}

impl LibraryNaming {
    /// Create a naming convention.
    pub const fn new(prefix: &'static str, suffix: &'static str) -> Self {
        Self { prefix, suffix }
    }

    /// File name for a type tag.
    pub fn file_name(&self, type_tag: &str) -> String {
        format!("{}{}{}", self.prefix, type_tag, self.suffix)
    }
}

/// Resolves type tags to library paths under a plugins directory.
#[derive(Debug, Clone)]
pub struct PluginResolver {
    plugins_dir: PathBuf,
    naming: LibraryNaming,
}

impl PluginResolver {
    /// Create a resolver using the current platform's naming convention.
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self::for_platform(plugins_dir, Platform::current())
    }

    /// Create a resolver for a specific platform convention.
    pub fn for_platform(plugins_dir: impl Into<PathBuf>, platform: Platform) -> Self {
        Self::with_naming(plugins_dir, platform.naming())
    }

    /// Create a resolver with a custom naming convention.
    pub fn with_naming(plugins_dir: impl Into<PathBuf>, naming: LibraryNaming) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            naming,
        }
    }

    /// Resolve a type tag to the library path it is expected at.
    pub fn resolve(&self, type_tag: &str) -> PathBuf {
        self.plugins_dir.join(self.naming.file_name(type_tag))
    }

    /// The configured plugins directory.
    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// The naming convention in use.
    pub fn naming(&self) -> LibraryNaming {
        self.naming
    }
}
