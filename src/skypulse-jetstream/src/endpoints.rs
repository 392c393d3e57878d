//! Endpoint pool and subscription URLs.

use url::Url;

use crate::error::{JetstreamError, JetstreamResult};
use crate::random::RandomSource;

/// Path of the Jetstream subscription resource.
const SUBSCRIBE_PATH: &str = "/subscribe";

/// Query parameter restricting the feed to a collection.
const WANTED_COLLECTIONS: &str = "wantedCollections";

/// One host of the pool with its prebuilt subscription URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    url: Url,
}

impl Endpoint {
    /// Host name (optionally with port) as configured.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Full subscription URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Ordered, non-empty set of equivalent streaming hosts.
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<Endpoint>,
}

impl EndpointPool {
    /// Build a pool, producing one subscription URL per host.
    pub fn new(hosts: &[String], collections: &[String], tls: bool) -> JetstreamResult<Self> {
        if hosts.is_empty() {
            return Err(JetstreamError::Config("endpoint pool is empty".to_string()));
        }

        let endpoints = hosts
            .iter()
            .map(|host| {
                Ok(Endpoint {
                    host: host.clone(),
                    url: subscribe_url(host, collections, tls)?,
                })
            })
            .collect::<JetstreamResult<Vec<_>>>()?;

        Ok(Self { endpoints })
    }

    /// Number of endpoints in the pool.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false; the pool cannot be built empty.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Pick one endpoint uniformly at random.
    pub fn choose(&self, rng: &mut dyn RandomSource) -> &Endpoint {
        &self.endpoints[rng.pick(self.endpoints.len())]
    }
}

/// Build `<scheme>://<host>/subscribe?wantedCollections=<collection>...`.
pub fn subscribe_url(host: &str, collections: &[String], tls: bool) -> JetstreamResult<Url> {
    let scheme = if tls { "wss" } else { "ws" };
    let mut url = Url::parse(&format!("{scheme}://{host}{SUBSCRIBE_PATH}")).map_err(|e| {
        JetstreamError::InvalidEndpoint {
            endpoint: host.to_string(),
            reason: e.to_string(),
        }
    })?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(JetstreamError::InvalidEndpoint {
            endpoint: host.to_string(),
            reason: "missing host".to_string(),
        });
    }

    // Anything past the authority would shift the path or swallow the query.
    if url.path() != SUBSCRIBE_PATH
        || url.query().is_some()
        || url.fragment().is_some()
        || !url.username().is_empty()
        || url.password().is_some()
    {
        return Err(JetstreamError::InvalidEndpoint {
            endpoint: host.to_string(),
            reason: "expected a bare host with optional port".to_string(),
        });
    }

    if !collections.is_empty() {
        let mut query = url.query_pairs_mut();
        for collection in collections {
            query.append_pair(WANTED_COLLECTIONS, collection);
        }
    }

    Ok(url)
}
