//! Proxy service logic.
//!
//! Decides the tracking cookies in `request_filter`, forwards the request
//! untouched, and appends the cookies in `response_filter`.

use crate::config::{Config, Result as ConfigResult};
use crate::core::middleware::{Assignment, TrackingCookies};
use async_trait::async_trait;
use http::header::SET_COOKIE;
use pingora::Result;
use pingora::http::ResponseHeader;
use pingora::proxy::{ProxyHttp, Session};
use pingora::upstreams::peer::HttpPeer;
use std::sync::Arc;
use tracing::{debug, warn};

/// Context for a single request.
#[derive(Debug, Default)]
pub struct RequestCtx {
    pub assignment: Option<Assignment>,
}

impl RequestCtx {
    /// Appends the decided cookies and error markers to an upstream response.
    ///
    /// # Errors
    ///
    /// Returns an error if a header cannot be written.
    pub fn apply(&self, upstream_response: &mut ResponseHeader) -> Result<()> {
        let Some(assignment) = &self.assignment else {
            return Ok(());
        };

        for cookie in assignment.set_cookies() {
            upstream_response.append_header(SET_COOKIE, cookie.clone())?;
        }
        for (name, value) in assignment.errors() {
            upstream_response.insert_header(name.clone(), value.clone())?;
        }

        Ok(())
    }
}

/// Main proxy service implementing `ProxyHttp`.
pub struct TrackingProxy {
    config: Arc<Config>,
    cookies: TrackingCookies,
}

impl TrackingProxy {
    /// Creates a new `TrackingProxy` service.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Config` if the cookie settings are invalid.
    pub fn new(config: Arc<Config>) -> ConfigResult<Self> {
        let cookies = TrackingCookies::new(config.cookies.clone())?;
        Ok(Self { config, cookies })
    }

    /// Upstream `host:port` taken from the configured backend URL.
    #[must_use]
    pub fn upstream_addr(&self) -> &str {
        let url = &self.config.backend_url;
        let addr = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))
            .unwrap_or(url);
        addr.trim_end_matches('/')
    }
}

#[async_trait]
impl ProxyHttp for TrackingProxy {
    type CTX = RequestCtx;

    fn new_ctx(&self) -> Self::CTX {
        RequestCtx::default()
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        ctx.assignment = Some(self.cookies.assign(&session.req_header().headers));
        Ok(false)
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let peer = Box::new(HttpPeer::new(self.upstream_addr(), false, String::new()));
        Ok(peer)
    }

    async fn response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        ctx.apply(upstream_response)
    }

    async fn logging(
        &self,
        session: &mut Session,
        _e: Option<&pingora::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status = session.response_written().map_or(0, |r| r.status.as_u16());
        let issued = ctx
            .assignment
            .as_ref()
            .map_or(0, |a| a.set_cookies().len());

        debug!(status = status, cookies_issued = issued, "Request completed");

        if status >= 500 {
            let path = session.req_header().uri.path();
            warn!(status = status, http_path = %path, "Upstream error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;
    use http::{HeaderMap, HeaderValue};

    #[test]
    fn test_proxy_creation() {
        let proxy = TrackingProxy::new(create_test_config()).unwrap();
        assert!(proxy.new_ctx().assignment.is_none());
    }

    #[test]
    fn test_proxy_rejects_invalid_settings() {
        let mut config = (*create_test_config()).clone();
        config.cookies.length = 500;
        assert!(TrackingProxy::new(Arc::new(config)).is_err());
    }

    #[test]
    fn test_upstream_addr() {
        let mut config = (*create_test_config()).clone();
        config.backend_url = "http://127.0.0.1:9000/".to_string();
        let proxy = TrackingProxy::new(Arc::new(config)).unwrap();
        assert_eq!(proxy.upstream_addr(), "127.0.0.1:9000");

        let mut config = (*create_test_config()).clone();
        config.backend_url = "backend:80".to_string();
        let proxy = TrackingProxy::new(Arc::new(config)).unwrap();
        assert_eq!(proxy.upstream_addr(), "backend:80");
    }

    #[test]
    fn test_ctx_apply_appends_cookies() {
        let proxy = TrackingProxy::new(create_test_config()).unwrap();
        let mut ctx = proxy.new_ctx();
        ctx.assignment = Some(proxy.cookies.assign(&HeaderMap::new()));

        let mut resp = ResponseHeader::build(200, None).unwrap();
        resp.insert_header("Set-Cookie", "app=1").unwrap();
        ctx.apply(&mut resp).unwrap();

        let cookies: Vec<_> = resp.headers.get_all("Set-Cookie").iter().collect();
        assert_eq!(cookies.len(), 3);
        assert!(
            cookies
                .iter()
                .any(|c| c.to_str().unwrap().starts_with("ttc-cid="))
        );
    }

    #[test]
    fn test_ctx_apply_without_assignment() {
        let ctx = RequestCtx::default();
        let mut resp = ResponseHeader::build(204, None).unwrap();
        ctx.apply(&mut resp).unwrap();
        assert!(resp.headers.get("Set-Cookie").is_none());
    }

    #[test]
    fn test_ctx_apply_existing_cookies_untouched() {
        let proxy = TrackingProxy::new(create_test_config()).unwrap();
        let mut request = HeaderMap::new();
        request.insert(
            "Cookie",
            HeaderValue::from_static("ttc-cid=c1; ttc-sid=s1"),
        );

        let ctx = RequestCtx {
            assignment: Some(proxy.cookies.assign(&request)),
        };
        let mut resp = ResponseHeader::build(200, None).unwrap();
        ctx.apply(&mut resp).unwrap();
        assert!(resp.headers.get("Set-Cookie").is_none());
    }
}
