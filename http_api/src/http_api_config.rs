use std::net::{Ipv4Addr, SocketAddr};

#[derive(Clone, Debug)]
pub struct HttpApiConfig {
    pub address: SocketAddr,
    /// Base URL the index page tells clients to fetch tiles from.
    pub public_endpoint: String,
    pub site_title: String,
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080));

        Self {
            address,
            public_endpoint: "http://127.0.0.1:8080".to_owned(),
            site_title: "validator atlas".to_owned(),
        }
    }
}
