//! # Tool Path Resolver
//!
//! Locates external binaries (the video transcoder) before a run starts.
//!
//! Lookup order:
//! 1. `MEDIA_COMPRESSOR_TOOLS_DIR` override directory, if set
//! 2. Every directory listed in `PATH`

use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a directory searched before `PATH`.
pub const TOOLS_DIR_ENV: &str = "MEDIA_COMPRESSOR_TOOLS_DIR";

/// Tool path resolver
#[derive(Debug, Clone, Default)]
pub struct ToolPathResolver {
    /// Directory searched before the system PATH
    tools_dir: Option<PathBuf>,
    /// Skip the system PATH entirely
    tools_dir_only: bool,
}

impl ToolPathResolver {
    /// Resolver honouring the override environment variable
    pub fn new() -> Self {
        let tools_dir = env::var_os(TOOLS_DIR_ENV)
            .map(PathBuf::from)
            .filter(|dir| dir.is_dir());
        if let Some(ref dir) = tools_dir {
            debug!("Using tools directory override: {}", dir.display());
        }
        Self {
            tools_dir,
            tools_dir_only: false,
        }
    }

    /// Resolver with an explicit override directory
    #[cfg(test)]
    pub fn with_tools_dir(tools_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: Some(tools_dir.into()),
            tools_dir_only: false,
        }
    }

    /// Resolver that only looks inside `tools_dir`, ignoring `PATH`
    pub fn isolated(tools_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: Some(tools_dir.into()),
            tools_dir_only: true,
        }
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        let file_name = Self::executable_name(tool_name);

        if let Some(ref dir) = self.tools_dir {
            let candidate = dir.join(&file_name);
            if candidate.is_file() {
                debug!("Resolved {} from tools dir: {}", tool_name, candidate.display());
                return Some(candidate);
            }
        }

        if self.tools_dir_only {
            debug!("Tool not found in tools dir: {}", tool_name);
            return None;
        }

        let found = Self::find_in_system_path(&file_name);
        match found {
            Some(ref path) => debug!("Resolved {} from PATH: {}", tool_name, path.display()),
            None => debug!("Tool not found: {}", tool_name),
        }
        found
    }

    /// Check if a specific tool is available
    #[cfg(test)]
    pub fn is_tool_available(&self, tool_name: &str) -> bool {
        self.resolve_tool(tool_name).is_some()
    }

    fn executable_name(tool_name: &str) -> String {
        if cfg!(windows) && Path::new(tool_name).extension().is_none() {
            format!("{}.exe", tool_name)
        } else {
            tool_name.to_string()
        }
    }

    fn find_in_system_path(file_name: &str) -> Option<PathBuf> {
        let path = env::var_os("PATH")?;
        env::split_paths(&path)
            .map(|dir| dir.join(file_name))
            .find(|candidate| candidate.is_file())
    }
}
