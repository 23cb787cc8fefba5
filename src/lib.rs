// Library root
// -----------
// This crate exposes the deploy workflow as a library. The binary
// (`main.rs`) wires it to the terminal through the `ui` module.
//
// Module responsibilities:
// - `workflow`: the deploy state machine (token -> name -> folder -> size
//   check -> archive -> upload -> retry on 401 -> cleanup).
// - `api`: HTTP upload to the Hostme deploy endpoint.
// - `archive`: folder measuring and zip creation.
// - `store`: persisted token and last-used project names.
// - `launcher`: owns the long-lived pieces and runs one deploy at a time.
// - `ui`: terminal implementation of the prompts, picker and progress bar.
//
// The workflow only talks to the `Ui`, `SettingsStore` and `Uploader`
// traits, so the terminal front-end can be swapped and the flow tested
// without a network or a TTY.
pub mod api;
pub mod archive;
pub mod cancel;
pub mod config;
pub mod error;
pub mod launcher;
pub mod slug;
pub mod store;
pub mod telemetry;
pub mod ui;
pub mod workflow;

pub use error::DeployError;
