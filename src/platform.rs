//! # Platform-specific utilities
//!
//! Questo modulo centralizza la gestione cross-platform dei tool esterni
//! usati dalla rimozione dello sfondo.
//!
//! ## Responsabilità:
//! - Risolve il comando da lanciare (override, tool bundled, PATH)
//! - Verifica la disponibilità di un tool con cache per tutta la sessione:
//!   un batch di N immagini non lancia N probe
//! - Legge la versione del tool per il report `tools`

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use tokio::process::Command;
use tracing::debug;

use crate::tool_resolver::ToolPathResolver;

/// Resolves and probes external commands, shared by the whole process
pub struct PlatformCommands {
    lookup_command: &'static str,
    resolver: ToolPathResolver,
    availability: Mutex<HashMap<String, bool>>,
}

impl PlatformCommands {
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(|| Self::with_resolver(ToolPathResolver::new()))
    }

    fn with_resolver(resolver: ToolPathResolver) -> Self {
        Self {
            lookup_command: if cfg!(windows) { "where" } else { "which" },
            resolver,
            availability: Mutex::new(HashMap::new()),
        }
    }

    /// Command to spawn for `tool`: the resolved path, or the bare name left to the OS lookup
    pub fn command_for(&self, tool: &str) -> PathBuf {
        self.resolver
            .resolve_tool(tool)
            .unwrap_or_else(|| PathBuf::from(format!("{}{}", tool, std::env::consts::EXE_SUFFIX)))
    }

    /// Whether `tool` can be launched. The first answer per tool is cached.
    pub async fn is_command_available(&self, tool: &str) -> bool {
        if let Some(known) = self.cached(tool) {
            return known;
        }

        let available = self.resolver.is_tool_available(tool)
            || Command::new(self.lookup_command)
                .arg(tool)
                .output()
                .await
                .map(|output| output.status.success())
                .unwrap_or(false);

        debug!("Probed {}: available={}", tool, available);
        if let Ok(mut cache) = self.availability.lock() {
            cache.insert(tool.to_string(), available);
        }
        available
    }

    fn cached(&self, tool: &str) -> Option<bool> {
        self.availability.lock().ok()?.get(tool).copied()
    }

    /// First line printed by `<tool> --version`, if the tool runs
    pub async fn tool_version(&self, tool: &str) -> Option<String> {
        let output = Command::new(self.command_for(tool))
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }

    /// Availability report of every known tool
    pub fn get_tools_report(&self) -> String {
        self.resolver.get_tools_report()
    }

    pub fn system_info() -> SystemInfo {
        SystemInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            exe_suffix: std::env::consts::EXE_SUFFIX,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub exe_suffix: &'static str,
}

impl std::fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)?;
        if !self.exe_suffix.is_empty() {
            write!(f, " (executables end in {})", self.exe_suffix)?;
        }
        Ok(())
    }
}
