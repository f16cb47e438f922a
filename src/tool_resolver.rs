//! # Tool Path Resolver
//!
//! Locates the external background-removal runner (`rembg`) in different environments:
//! - Explicit override through `REMBG_PATH`
//! - Bundled tools directory (`TOOLS_DIR`, or `tools/` next to the executable)
//! - System PATH (includes Python virtualenv `bin/` when activated)

use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Tools the pipeline can drive
pub const KNOWN_TOOLS: &[&str] = &["rembg"];

/// Tool path resolver for different deployment environments
pub struct ToolPathResolver {
    /// Directory where tools are bundled, if any
    tools_dir: Option<PathBuf>,
}

impl ToolPathResolver {
    pub fn new() -> Self {
        Self {
            tools_dir: Self::detect_bundled_tools_dir(),
        }
    }

    /// Resolver with an explicit bundled tools directory
    pub fn with_tools_dir(tools_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: Some(tools_dir.into()),
        }
    }

    fn detect_bundled_tools_dir() -> Option<PathBuf> {
        if let Ok(tools_dir) = env::var("TOOLS_DIR") {
            let tools_path = PathBuf::from(tools_dir);
            debug!("Checking TOOLS_DIR environment variable: {:?}", tools_path);
            if tools_path.is_dir() {
                return Some(tools_path);
            }
        }

        let exe_path = env::current_exe().ok()?;
        let candidate = exe_path.parent()?.join("tools");
        debug!("Checking bundled tools path: {:?}", candidate);
        if candidate.is_dir() {
            return Some(candidate);
        }

        None
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        let override_var = format!("{}_PATH", tool_name.to_uppercase());
        if let Some(path) = env::var_os(&override_var).map(PathBuf::from) {
            if path.is_file() {
                debug!("Using {} override: {:?}", override_var, path);
                return Some(path);
            }
            warn!("{} points to a missing file: {:?}", override_var, path);
        }

        if let Some(ref tools_dir) = self.tools_dir {
            let bundled_path = Self::bundled_tool_path(tools_dir, tool_name);
            if bundled_path.is_file() {
                debug!("Using bundled tool: {} -> {:?}", tool_name, bundled_path);
                return Some(bundled_path);
            }
        }

        if let Some(system_path) = Self::find_in_system_path(tool_name) {
            debug!("Using system tool: {} -> {:?}", tool_name, system_path);
            return Some(system_path);
        }

        debug!("Tool not found: {}", tool_name);
        None
    }

    fn bundled_tool_path(tools_dir: &Path, tool_name: &str) -> PathBuf {
        tools_dir.join(format!("{}{}", tool_name, env::consts::EXE_SUFFIX))
    }

    fn find_in_system_path(tool_name: &str) -> Option<PathBuf> {
        let tool_with_ext = format!("{}{}", tool_name, env::consts::EXE_SUFFIX);
        let path_var = env::var_os("PATH")?;

        env::split_paths(&path_var)
            .map(|dir| dir.join(&tool_with_ext))
            .find(|path| path.is_file())
    }

    /// Check if a specific tool is available
    pub fn is_tool_available(&self, tool_name: &str) -> bool {
        self.resolve_tool(tool_name).is_some()
    }

    /// Installation hint shown when a tool is missing
    pub fn install_instructions(tool_name: &str) -> String {
        match tool_name {
            "rembg" => "pip install \"rembg[cli]\"".to_string(),
            _ => format!("install '{}' and make sure it is on PATH", tool_name),
        }
    }

    /// Check if a tool is available and provide installation instructions if not
    pub fn check_tool_with_instructions(&self, tool_name: &str) -> Result<PathBuf, String> {
        self.resolve_tool(tool_name).ok_or_else(|| {
            format!(
                "Tool '{}' not found.\nTo install, run:\n  {}",
                tool_name,
                Self::install_instructions(tool_name)
            )
        })
    }

    /// Get a report of tool availability
    pub fn get_tools_report(&self) -> String {
        let mut report = String::new();
        report.push_str("Tool Path Resolver Report\n");
        report.push_str(&format!("Bundled tools dir: {:?}\n", self.tools_dir));
        report.push_str("\nTool Availability:\n");

        for tool in KNOWN_TOOLS {
            match self.check_tool_with_instructions(tool) {
                Ok(path) => report.push_str(&format!("  ✅ {} -> {:?}\n", tool, path)),
                Err(_) => report.push_str(&format!(
                    "  ❌ {} (install with: {})\n",
                    tool,
                    Self::install_instructions(tool)
                )),
            }
        }

        report
    }
}

impl Default for ToolPathResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bundled_tool_is_resolved() {
        let temp_dir = TempDir::new().unwrap();
        let tool_name = "fake-segmenter-tool";
        let tool_path = temp_dir
            .path()
            .join(format!("{}{}", tool_name, env::consts::EXE_SUFFIX));
        std::fs::write(&tool_path, b"#!/bin/sh\n").unwrap();

        let resolver = ToolPathResolver::with_tools_dir(temp_dir.path());
        assert_eq!(resolver.resolve_tool(tool_name), Some(tool_path));
    }

    #[test]
    fn test_missing_tool_has_instructions() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = ToolPathResolver::with_tools_dir(temp_dir.path());

        let err = resolver
            .check_tool_with_instructions("definitely-not-a-real-tool-xyz")
            .unwrap_err();
        assert!(err.contains("definitely-not-a-real-tool-xyz"));
    }

    #[test]
    fn test_report_lists_known_tools() {
        let report = ToolPathResolver::default().get_tools_report();
        assert!(report.contains("rembg"));
    }
}
