//! Constants for the download module (timeouts, buffering).

use std::time::Duration;

/// Upper bound on the HTTP connect timeout; the per-request timeout applies when lower.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Write buffer size for streamed downloads (1 MiB).
pub const DOWNLOAD_BUFFER_BYTES: usize = 1024 * 1024;
