//! Host identification for the node
//!
//! This module handles:
//! - Hostname detection (default edge node id)
//! - OS name and version reported in NBIRTH

use sysinfo::System;
use tracing::{debug, info};

/// Identity of the host the node runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub hostname: String,
    pub os: String,
    pub os_version: String,
}

impl SystemInfo {
    /// Discover host identity. Never fails: missing values fall back to
    /// compile-time constants.
    pub fn discover() -> Self {
        let hostname = hostname();

        let os = System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
        let os_version = System::os_version()
            .or_else(System::kernel_version)
            .unwrap_or_else(|| "unknown".to_string());

        info!("Discovery complete - Hostname: {}, OS: {} {}", hostname, os, os_version);

        SystemInfo {
            hostname,
            os,
            os_version,
        }
    }
}

/// Local host name, `localhost` if it cannot be read.
pub fn hostname() -> String {
    let name = gethostname::gethostname().to_string_lossy().to_string();
    if name.is_empty() {
        debug!("Empty hostname, using localhost");
        return "localhost".to_string();
    }
    name
}
