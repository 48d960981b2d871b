//! Application-wide constants for tag names, timeouts, and scheduling defaults

/// Tag names used to mark and cross-reference snapshots and instances
pub mod tags {
    /// Namespace prefix for every tag this agent reads or writes
    pub const NAMESPACE: &str = "shutter";

    /// Opt-in marker on instances ("true"/"yes", case-insensitive)
    pub const ENABLED: &str = "shutter:enabled";

    /// Provenance marker on snapshots created by this agent
    pub const MANAGED: &str = "shutter:managed";

    /// Back-reference from a snapshot to its source instance id
    pub const SOURCE_INSTANCE: &str = "shutter:source-instance";

    /// Region the source snapshot lived in, set on offsite copies
    pub const SOURCE_REGION: &str = "shutter:source-region";
}

/// Scheduling defaults
pub mod scheduling {
    /// Minutes of tolerance subtracted from the next-due threshold so a cron
    /// firing slightly early does not skip a whole cycle
    pub const DEFAULT_JITTER_MINUTES: i64 = 10;

    /// Maximum instances processed concurrently in one pass
    pub const DEFAULT_CONCURRENCY_LIMIT: usize = 10;
}

/// Cloud API client defaults
pub mod api {
    /// Default timeout for individual provider API requests
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// Interval between polls while waiting on a snapshot to complete
    pub const COPY_POLL_INTERVAL_SECONDS: u64 = 15;

    /// Maximum time to wait for a source snapshot before replication
    pub const COPY_WAIT_TIMEOUT_SECONDS: u64 = 3600;
}
