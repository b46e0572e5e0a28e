// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! Just enough HTTP/1.1 to speak to the osu! client: one request per
//! connection, Content-Length bodies, case-insensitive headers. The
//! game client never pipelines and never sends chunked bodies.

use anyhow::{anyhow, bail, Context, Result};
use futures::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const MAX_HEADER_LINE: usize = 8192;
const MAX_BODY: usize = 1024 * 1024;

#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Read one complete request off the stream.
/// Cancellation-unsafe, but each connection serves a single request.
pub async fn read_request<T: AsyncBufRead + Unpin>(stream: &mut T) -> Result<Request> {
    let mut line = String::new();
    stream.read_line(&mut line).await?;
    if line.is_empty() {
        bail!("Connection terminated before the request line");
    }

    let mut parts = line.split_whitespace();
    let method = parts.next().context("missing request method")?.to_owned();
    let raw_path = parts.next().context("missing request path")?;
    // strip the query; nothing served here takes parameters
    let path = raw_path
        .split_once('?')
        .map_or(raw_path, |(path, _)| path)
        .to_owned();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        stream.read_line(&mut line).await?;
        if line.len() > MAX_HEADER_LINE {
            bail!("Header line too long");
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        let (key, value) = line
            .split_once(':')
            .with_context(|| format!("malformed header line: {line:?}"))?;
        headers.push((key.trim().to_owned(), value.trim().to_owned()));
    }

    let mut request = Request {
        method,
        path,
        headers,
        body: Vec::new(),
    };

    if let Some(len) = request.header("content-length") {
        let len: usize = len.parse().context("malformed Content-Length")?;
        if len > MAX_BODY {
            bail!("Request body too large ({len} bytes)");
        }
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await?;
        request.body = body;
    }

    Ok(request)
}

#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_owned(), value.into()));
        self
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.with_header("Content-Type", content_type)
    }

    pub fn octet_stream(body: Vec<u8>) -> Self {
        Self::new(200).with_body("application/octet-stream", body)
    }

    pub fn html(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200).with_body("text/html; charset=utf-8", body)
    }

    pub fn not_found() -> Self {
        Self::new(404).with_body("text/plain", "404 Not Found")
    }

    pub fn method_not_allowed() -> Self {
        Self::new(405).with_body("text/plain", "405 Method Not Allowed")
    }

    pub fn internal_error(diagnostic: &str) -> Self {
        Self::new(500).with_body("text/plain", format!("500 Whoops!\n\n{diagnostic}"))
    }
}

pub async fn write_response<T: AsyncWrite + Unpin>(stream: &mut T, resp: &Response) -> Result<()> {
    let mut head = format!("HTTP/1.1 {} {}\r\n", resp.status, reason_phrase(resp.status));
    for (key, value) in &resp.headers {
        head.push_str(&format!("{key}: {value}\r\n"));
    }
    head.push_str(&format!("Content-Length: {}\r\n\r\n", resp.body.len()));

    stream
        .write_all(head.as_bytes())
        .await
        .map_err(|e| anyhow!("failed to send response head: {e}"))?;
    stream
        .write_all(&resp.body)
        .await
        .map_err(|e| anyhow!("failed to send response body: {e}"))?;
    stream.flush().await?;
    Ok(())
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::BufReader;

    #[test]
    fn parses_a_post_with_body() {
        let raw = b"POST / HTTP/1.1\r\nHost: localhost:2137\r\nuser-agent: osu!\r\nContent-Length: 5\r\n\r\nhello";
        let req = smol::block_on(read_request(&mut BufReader::new(&raw[..]))).unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/");
        assert_eq!(req.header("USER-AGENT"), Some("osu!"));
        assert_eq!(req.header("osu-token"), None);
        assert_eq!(req.body, b"hello");
    }

    #[test]
    fn strips_query_strings() {
        let raw = b"GET /3?size=256 HTTP/1.1\r\nHost: a.localhost\r\n\r\n";
        let req = smol::block_on(read_request(&mut BufReader::new(&raw[..]))).unwrap();
        assert_eq!(req.path, "/3");
    }

    #[test]
    fn writes_content_length() {
        let resp = Response::octet_stream(vec![1, 2, 3]).with_header("cho-token", "abc");
        let mut out = Vec::new();
        smol::block_on(write_response(&mut out, &resp)).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("cho-token: abc\r\n"));
        assert!(text.contains("Content-Length: 3\r\n\r\n"));
    }
}
