use serde::{Deserialize, Serialize};

/// Determines whether bundles are produced on a timer or only on explicit
/// `debug_bundler_sendBundleNow` calls
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleMode {
    /// Bundle user operations on the configured interval
    Auto,
    /// Bundle only on demand
    Manual,
}
