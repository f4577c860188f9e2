//! Observability setup for PolyBot: structured logging and optional
//! OpenTelemetry span export.

pub mod tracing_setup;
