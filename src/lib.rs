//! Paper-to-code pipeline: plan a reproduction of a research paper, analyse
//! each planned file, generate the repository file by file and finish with a
//! run script. Every step is a language-model completion whose inputs and
//! outputs are kept on disk.

pub mod audit;
pub mod config;
pub mod context;
pub mod cost;
pub mod errors;
pub mod gateway;
pub mod logging;
pub mod paper;
pub mod pipeline;
pub mod planning;
pub mod prompts;
pub mod settings;
pub mod stage;
pub mod status;
pub mod store;
pub mod trajectory;
pub mod ui;
pub mod util;

#[cfg(test)]
mod testing;
