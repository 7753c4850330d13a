//! Akeray daemon library - exposes modules for testing.

pub mod logging;
pub mod metrics;
pub mod normalizer;
pub mod routes;
pub mod server;

pub use normalizer::{
    catch_panic_layer, into_response_service, normalize, normalize_future, NormalizeErrorLayer,
    NormalizeErrorService, NormalizedError, NormalizedResponseService,
};
