//! Backend for trying the proxy locally.
//!
//! Echoes the `Cookie` header it received so the tracking cookies set by the
//! proxy on an earlier response can be seen coming back.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;

async fn echo_cookies(
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let cookies = req
        .headers()
        .get("Cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let (body, status) = match req.uri().path() {
        "/" => (Bytes::from(format!("cookies: {cookies}\n")), StatusCode::OK),
        _ => (Bytes::from("404 Not Found"), StatusCode::NOT_FOUND),
    };

    let response = Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .header("Set-Cookie", "backend=1; Path=/")
        .body(Full::new(body))
        .unwrap();

    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([127, 0, 0, 1], 9000));

    let listener = TcpListener::bind(addr).await?;
    println!("Mock backend listening on http://{addr}");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);

        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .serve_connection(io, service_fn(echo_cookies))
                .await
            {
                eprintln!("Error serving connection: {err:?}");
            }
        });
    }
}
