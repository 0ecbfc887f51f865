//! # PPP Harness
//!
//! **Ingestion pipeline and query service for the SBA Paycheck Protection
//! Program loan-disclosure dataset.**
//!
//! The publisher ships a large CSV plus a field-dictionary workbook. PPP
//! Harness fetches both, checks the CSV header against the dictionary,
//! cleans and types every row, and commits the batch to SQLite in one
//! transaction. A CLI and a small HTTP server then search the stored loans.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────┐   ┌───────────┐   ┌───────────┐   ┌─────────┐
//! │  Fetch   │──▶│  Load  │──▶│ Reconcile │──▶│ Normalize │──▶│ Persist │
//! │ CSV+dict │   │  CSV   │   │ vs. dict  │   │  coerce   │   │ 1 tx    │
//! └──────────┘   └────────┘   └───────────┘   └───────────┘   └────┬────┘
//!                                                                  │
//!                                              ┌───────────────────┤
//!                                              ▼                   ▼
//!                                         ┌──────────┐       ┌──────────┐
//!                                         │   CLI    │       │   HTTP   │
//!                                         │  (ppp)   │       │  (axum)  │
//!                                         └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ppp init                          # create database
//! ppp ingest                        # fetch, validate, clean, store
//! ppp search "coatings" --state SC  # borrower search
//! ppp get 9547507704                # one loan by number
//! ppp serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Artifact handles, `RawTable`, `NormalizedRecord` |
//! | [`error`] | Ingestion failure taxonomy |
//! | [`fetch`] | Concurrent retrieval of dataset and dictionary |
//! | [`loader`] | CSV decoding (UTF-8, ISO-8859-1 fallback) with row cap |
//! | [`reconcile`] | Dictionary parsing and header check |
//! | [`normalize`] | Row dropping, numeric/date coercion, missing values |
//! | [`persist`] | All-or-nothing batch insert |
//! | [`ingest`] | Pipeline state machine |
//! | [`search`] | Borrower name/state/city search |
//! | [`get`] | Record lookup by loan number |
//! | [`stats`] | Record, duplicate, and batch counts |
//! | [`server`] | HTTP server (Axum) with CORS |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |

pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod get;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod persist;
pub mod reconcile;
pub mod search;
pub mod server;
pub mod stats;

pub use error::IngestError;
pub use ingest::{IngestRun, IngestState, IngestSummary};
pub use models::{ExpectedFieldSet, NormalizedRecord, RawTable};
