//! Default values shared by the runtime crates
//!
//! These are the values used when neither a configuration file nor an
//! environment override provides a setting.

/// Reference namespace defaults
pub mod naming {
    /// Prefix of every locally created reference
    pub const NAMESPACE: &str = "actor://";

    /// Simple name of the absent sender/receiver
    pub const NOBODY: &str = "NOBODY";
}

/// Worker pool defaults
pub mod executor {
    /// Upper bound on concurrently running workers
    pub const MAX_THREADS: usize = 1024;

    /// Idle time before a non-core worker exits (milliseconds)
    pub const KEEP_ALIVE_MS: u64 = 60_000;

    /// Name given to worker threads
    pub const THREAD_NAME: &str = "actor-worker";
}

/// Envelope log defaults
pub mod logging {
    /// Flush period of the background writer (milliseconds)
    pub const FLUSH_INTERVAL_MS: u64 = 100;

    /// Maximum number of lines written per flush
    pub const MAX_BATCH: usize = 8192;
}

/// Remote endpoint defaults
pub mod remote {
    pub const HOST: &str = "127.0.0.1";

    pub const PORT: u16 = 7777;

    /// Bound on a single outgoing request (seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Admission limit for actors created through a server
    pub const MAX_LOCAL_ACTORS: usize = 65_536;
}
