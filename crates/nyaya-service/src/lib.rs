//! Request/response calls to the reviewing service: case intake and the
//! post-verdict query. None of these share state with a live session.

mod client;
mod error;
mod examination;

pub use client::{Health, SampleKind, ServiceClient, ServiceConfig, BENCH_IN_RECESS};
pub use error::ServiceError;
pub use examination::{CrossExamination, Exchange, Speaker};
