//! CLI command implementations.
//!
//! | Module   | Commands handled                                           |
//! |----------|------------------------------------------------------------|
//! | `stages` | `Plan`, `ExtractConfig`, `Analyze`, `Code`, `Reproduce`, `Run` |
//! | `status` | `Status`                                                   |

pub mod stages;
pub mod status;

pub use stages::{cmd_analyze, cmd_code, cmd_extract_config, cmd_plan, cmd_reproduce, cmd_run};
pub use status::cmd_status;
