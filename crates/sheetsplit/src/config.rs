//! Settings for a conversion run.

use std::time::Duration;

use crate::naming::NamePolicy;

/// Where the office process listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Default: "localhost".
    pub host: String,
    /// Default: 2002.
    pub port: u16,
    /// Bound on the single connection attempt. Default: 10 seconds.
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 2002,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Properties passed to `loadComponentFromURL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Load without showing a window.
    pub hidden: bool,
    pub read_only: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            hidden: true,
            read_only: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    pub naming: NamePolicy,
    /// Pause before and after each export.
    pub slow: bool,
    pub load: LoadOptions,
}
