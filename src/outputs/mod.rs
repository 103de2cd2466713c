//! Run output files.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── 2025-05-06/
//!     ├── morning.json          # CollectionResult of the morning run
//!     ├── afternoon.json
//!     └── afternoon_script.json # drafted script, when enabled
//! ```

pub mod json;
