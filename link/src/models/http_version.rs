use serde::{Deserialize, Serialize};

/// HTTP protocol version used by the client's connection pool.
///
/// Streams are long-lived single requests, so HTTP/1.1 is the default;
/// HTTP/2 helps only when many sessions share one backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpVersion {
    #[default]
    #[serde(rename = "http1", alias = "http/1.1", alias = "1.1")]
    Http1,

    #[serde(rename = "http2", alias = "http/2", alias = "2")]
    Http2,

    /// Negotiate via ALPN on HTTPS, HTTP/1.1 otherwise.
    #[serde(rename = "auto")]
    Auto,
}

impl HttpVersion {
    pub(crate) fn apply(self, builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
        match self {
            HttpVersion::Http1 => {
                log::debug!("[tasklog-link] Using HTTP/1.1 only");
                builder.http1_only()
            },
            HttpVersion::Http2 => {
                log::debug!("[tasklog-link] Using HTTP/2 with prior knowledge");
                builder.http2_prior_knowledge()
            },
            HttpVersion::Auto => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        #[derive(Deserialize)]
        struct Wrap {
            v: HttpVersion,
        }
        let w: Wrap = toml::from_str(r#"v = "http/2""#).unwrap();
        assert_eq!(w.v, HttpVersion::Http2);
        let w: Wrap = toml::from_str(r#"v = "auto""#).unwrap();
        assert_eq!(w.v, HttpVersion::Auto);
    }
}
