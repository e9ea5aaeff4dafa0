//! Broker holdings CSV normalization.
//!
//! The pipeline gates an uploaded export on its header set ([`schema`]),
//! decodes rows ([`ingest`]), pulls numeric fields out of each row's text
//! cells ([`extract`]) and orders the records by holdings ([`record`]).
//! [`report`] renders the result; [`server`] and [`broker`] are the HTTP
//! boundary.

pub mod broker;
pub mod config;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod record;
pub mod report;
pub mod schema;
pub mod server;
pub mod symbols;

pub use error::{ProcessError, ProxyError, ReportError};
pub use extract::extract_record;
pub use ingest::{process_csv, stream_rows, ProcessResponse};
pub use record::{build_record_set, sort_by_holdings, NormalizedRecord, RawRow};
