//! Default implementations for HTTP configuration

use std::time::Duration;

use super::types::HttpConfig;
use crate::txn::filter::ResponseFilters;

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Some(Duration::from_secs(60)),
            read_idle_timeout: Some(Duration::from_secs(60)),
            write_timeout: Duration::from_secs(30),
            pooling_enabled: true,
            pool_secure_connections: true,
            pool_idle_timeout: Duration::from_secs(60),
            max_connection_lifetime: None,
            pool_cleaner_period: Duration::from_secs(1),
            max_connections: None,
            max_connections_per_host: None,
            follow_redirects: false,
            max_redirects: 5,
            remove_query_on_redirect: false,
            strict_302_handling: false,
            max_request_retry: 5,
            proxy: None,
            realm: None,
            response_filters: ResponseFilters::default(),
            feeder_max_pending_bytes: 64 * 1024,
            user_agent: "conduit/0.1.0".to_string(),
        }
    }
}
