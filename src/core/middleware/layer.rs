//! Tower integration.
//!
//! `TrackingCookieLayer` wraps any `http` service: the request is passed
//! through unchanged apart from a `TrackingIds` extension, and the inner
//! service's response receives the tracking cookies.

use super::cookie::{Assignment, TrackingCookies};
use crate::config::{CookieSettings, Result};
use http::{Request, Response};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use tower::{Layer, Service};

/// Layer applying [`TrackingCookieService`].
#[derive(Debug, Clone)]
pub struct TrackingCookieLayer {
    cookies: Arc<TrackingCookies>,
}

impl TrackingCookieLayer {
    /// Builds a layer from cookie settings.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Config` if the settings are invalid.
    pub fn new(settings: CookieSettings) -> Result<Self> {
        Ok(Self::from_cookies(TrackingCookies::new(settings)?))
    }

    #[must_use]
    pub fn from_cookies(cookies: TrackingCookies) -> Self {
        Self {
            cookies: Arc::new(cookies),
        }
    }
}

impl<S> Layer<S> for TrackingCookieLayer {
    type Service = TrackingCookieService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TrackingCookieService {
            inner,
            cookies: Arc::clone(&self.cookies),
        }
    }
}

/// Middleware issuing tracking cookies around an inner service.
#[derive(Debug, Clone)]
pub struct TrackingCookieService<S> {
    inner: S,
    cookies: Arc<TrackingCookies>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TrackingCookieService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let assignment = self.cookies.assign(req.headers());
        req.extensions_mut().insert(assignment.ids().clone());

        ResponseFuture {
            inner: self.inner.call(req),
            assignment: Some(assignment),
        }
    }
}

pin_project! {
    /// Response future of [`TrackingCookieService`].
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        assignment: Option<Assignment>,
    }
}

impl<F, ResBody, E> Future for ResponseFuture<F>
where
    F: Future<Output = std::result::Result<Response<ResBody>, E>>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let mut response = ready!(this.inner.poll(cx))?;

        if let Some(assignment) = this.assignment.take() {
            assignment.apply(response.headers_mut());
        }

        Poll::Ready(Ok(response))
    }
}
