use std::time::Duration;

// Bulk paging: points per page for the list data access calls
pub const PAGE_SIZE: usize = 1000;

// Data pipe polling
pub const MAX_PIPE_EVENTS: usize = 20;
pub const PIPE_POLL_INTERVAL: Duration = Duration::from_millis(500);

// Mode parameter defaults
pub const DEFAULT_PLOT_INTERVALS: u32 = 640; // horizontal pixels in the trend
pub const DEFAULT_INTERP_COUNT: u32 = 10;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
