//! Stream endpoint address.

use std::{fmt::Display, str::FromStr};

use snafu::prelude::*;

/// Parse string as stream endpoint error
#[derive(Debug, Snafu)]
#[snafu(
    visibility(pub(crate)),
    module(parse_endpoint_error_variant),
    context(suffix(false))
)]
pub enum ParseEndpointError {
    #[snafu(display("{s} is an invalid url: {source}"))]
    /// the str is not a valid url
    InvalidURL {
        /// string be parsed
        s: String,
        /// source error
        source: url::ParseError,
    },

    /// the parsed url scheme is not websocket
    #[snafu(display("the url {s} has invalid scheme {scheme}, only ws or wss is ok"))]
    InvalidScheme {
        /// the url
        s: String,
        /// invalid scheme
        scheme: String,
    },

    /// the parsed url has no host
    #[snafu(display("the endpoint url {s} has no host"))]
    NoHost {
        /// the url
        s: String,
    },
}

/// Parsed alert stream endpoint.
///
/// The endpoint never carries a credential; the token is appended as a query
/// parameter only when the handshake url is built, so displaying or logging
/// an endpoint can not leak it.
#[derive(Debug, Clone)]
pub struct StreamEndpoint {
    /// url scheme, ws or wss
    pub scheme: String,
    /// endpoint host(domain)
    pub host: String,
    /// endpoint port
    pub port: Option<u16>,
    /// request path
    pub path: String,
}

impl StreamEndpoint {
    /// construct final handshake url, presenting the token as a
    /// url-encoded query parameter
    pub(crate) fn url(&self, token: &str) -> url::Url {
        let mut u =
            url::Url::parse(&format!("{}://{}{}", self.scheme, self.host, self.path)).unwrap();
        let _ = u.set_port(self.port);

        u.query_pairs_mut().append_pair("token", token);

        u
    }
}

impl FromStr for StreamEndpoint {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = url::Url::parse(s)
            .with_context(|_| parse_endpoint_error_variant::InvalidURL { s: s.to_string() })?;

        ensure!(
            url.scheme() == "wss" || url.scheme() == "ws",
            parse_endpoint_error_variant::InvalidScheme {
                s,
                scheme: url.scheme(),
            }
        );

        ensure!(
            url.host().is_some(),
            parse_endpoint_error_variant::NoHost { s }
        );

        Ok(StreamEndpoint {
            scheme: url.scheme().to_string(),
            host: url.host().unwrap().to_string(),
            port: url.port(),
            path: url.path().to_string(),
        })
    }
}

impl Display for StreamEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        f.write_str(&self.path)
    }
}
