// Library root
// -----------
// Terminal client for the data-acquisition archive server. The binary
// (`main.rs`) wires these modules into the interactive CLI.
//
// Module responsibilities:
// - `config`: reads server address, trust anchor and tuning knobs from the
//   environment / `.env` files.
// - `transport`: HTTPS plumbing behind the `Transport` trait.
// - `api`: registration, row count, status and single-page requests, plus
//   the `ApiClient` facade holding the session.
// - `retrieval`: page planning, sequential page download and assembly.
// - `export`: writes a dataset to an `.xlsx` workbook.
// - `ui`: prompts, menu and terminal output.
pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod retrieval;
pub mod transport;
pub mod ui;
