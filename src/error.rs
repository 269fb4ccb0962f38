//! crate error types

use snafu::prelude::*;

use crate::ws::ParseEndpointError;

/// crate error type
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum Error {
    /// Given stream endpoint url is invalid
    #[snafu(display("invalid stream endpoint {url}: {source}"))]
    InvalidEndpoint {
        /// given url
        url: String,
        /// source error
        source: ParseEndpointError,
    },
}
