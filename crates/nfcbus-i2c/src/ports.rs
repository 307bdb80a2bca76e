use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::LOG_TARGET;

/// Device directory on Linux hosts.
pub const LINUX_DEVICE_DIR: &str = "/dev";
/// Name prefix of Linux i2c-dev bus device files (`/dev/i2c-N`).
pub const LINUX_I2C_PREFIX: &str = "i2c-";

/// One recognized bus device name prefix and what it denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortPrefix {
    pub prefix: String,
    pub meaning: String,
}

/// A bus device file found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Full path of the device file.
    pub path: PathBuf,
    /// The prefix it matched.
    pub prefix: String,
    /// What that prefix denotes on this platform.
    pub meaning: String,
}

/// Naming convention used to discover bus device files on a host.
///
/// The convention is plain data so it can be chosen per target platform at
/// startup or overridden entirely (tests point it at a scratch directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortNaming {
    device_dir: PathBuf,
    prefixes: Vec<PortPrefix>,
}

impl PortNaming {
    /// A convention with no recognized prefixes.
    pub fn new(device_dir: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: device_dir.into(),
            prefixes: Vec::new(),
        }
    }

    /// Linux i2c-dev: `/dev/i2c-N`.
    pub fn linux() -> Self {
        Self::new(LINUX_DEVICE_DIR).with_prefix(LINUX_I2C_PREFIX, "Linux i2c-dev adapter")
    }

    /// Convention for an OS name as reported by `std::env::consts::OS`.
    ///
    /// Hosts without a known convention get an empty prefix set, so scans
    /// find nothing instead of failing.
    pub fn for_os(os: &str) -> Self {
        match os {
            "linux" | "android" => Self::linux(),
            _ => Self::new(LINUX_DEVICE_DIR),
        }
    }

    /// Convention for the running host.
    pub fn host() -> Self {
        Self::for_os(std::env::consts::OS)
    }

    pub fn with_device_dir(mut self, device_dir: impl Into<PathBuf>) -> Self {
        self.device_dir = device_dir.into();
        self
    }

    /// Add a recognized prefix. Prefixes already present are not added twice.
    pub fn with_prefix(mut self, prefix: impl Into<String>, meaning: impl Into<String>) -> Self {
        let prefix = prefix.into();
        if !self.prefixes.iter().any(|p| p.prefix == prefix) {
            self.prefixes.push(PortPrefix {
                prefix,
                meaning: meaning.into(),
            });
        }
        self
    }

    pub fn device_dir(&self) -> &Path {
        &self.device_dir
    }

    pub fn prefixes(&self) -> &[PortPrefix] {
        &self.prefixes
    }

    /// The first prefix `name` starts with, if any.
    pub fn classify(&self, name: &str) -> Option<&PortPrefix> {
        self.prefixes.iter().find(|p| name.starts_with(&p.prefix))
    }

    /// Scan the device directory for bus device files.
    ///
    /// Entries are returned in directory order. An unreadable directory
    /// yields an empty list; discovery is best-effort.
    pub fn scan(&self) -> Vec<PortInfo> {
        let mut ports = Vec::new();
        if self.prefixes.is_empty() {
            debug!(target: LOG_TARGET, "no bus device prefixes configured for this host");
            return ports;
        }

        let entries = match std::fs::read_dir(&self.device_dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    dir = ?self.device_dir,
                    error = %err,
                    "cannot read device directory"
                );
                return ports;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        target: LOG_TARGET,
                        dir = ?self.device_dir,
                        error = %err,
                        "device directory scan stopped early"
                    );
                    break;
                }
            };
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(matched) = self.classify(name) {
                ports.push(PortInfo {
                    path: self.device_dir.join(name),
                    prefix: matched.prefix.clone(),
                    meaning: matched.meaning.clone(),
                });
            }
        }

        debug!(target: LOG_TARGET, dir = ?self.device_dir, found = ports.len(), "scanned for bus devices");
        ports
    }

    /// Paths of all bus device files, in directory order.
    pub fn list_ports(&self) -> Vec<PathBuf> {
        self.scan().into_iter().map(|p| p.path).collect()
    }
}

impl Default for PortNaming {
    fn default() -> Self {
        Self::host()
    }
}

/// List bus device files on the running host.
pub fn list_ports() -> Vec<PathBuf> {
    PortNaming::host().list_ports()
}
