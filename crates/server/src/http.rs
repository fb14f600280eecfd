#![forbid(unsafe_code)]

use serde_json::json;
use std::io::{Read, Write};
use std::net::TcpStream;

pub(crate) const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_HEADER_BYTES: usize = 16 * 1024;

pub(crate) struct HttpRequest {
    pub(crate) method: String,
    pub(crate) target: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
}

impl HttpRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub(crate) enum ReadOutcome {
    Request(HttpRequest),
    TooLarge,
    /// The peer stopped sending before `Content-Length` bytes of body arrived.
    Incomplete { expected: usize, received: usize },
    Closed,
}

pub(crate) fn read_request(stream: &mut TcpStream) -> std::io::Result<ReadOutcome> {
    let mut buf = [0u8; 4096];
    let mut data = Vec::<u8>::new();
    loop {
        let read = match stream.read(&mut buf) {
            Ok(read) => read,
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                break;
            }
            Err(err) => return Err(err),
        };
        if read == 0 {
            break;
        }
        data.extend_from_slice(&buf[..read]);
        if data.windows(4).any(|w| w == b"\r\n\r\n") || data.len() > MAX_HEADER_BYTES {
            break;
        }
    }
    if data.is_empty() {
        return Ok(ReadOutcome::Closed);
    }

    let header_end = data
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
        .unwrap_or(data.len());
    let header_text = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut body = data[header_end..].to_vec();

    let mut lines = header_text.split("\r\n");
    let Some(request_line) = lines.next() else {
        return Ok(ReadOutcome::Closed);
    };
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let target = parts.next().unwrap_or("/").to_string();

    let mut headers = Vec::new();
    let mut content_length: usize = 0;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().unwrap_or(0);
        }
        headers.push((name.to_string(), value.to_string()));
    }

    if content_length > MAX_BODY_BYTES {
        return Ok(ReadOutcome::TooLarge);
    }

    body.truncate(content_length);
    while body.len() < content_length {
        let read = match stream.read(&mut buf) {
            Ok(read) => read,
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                0
            }
            Err(err) => return Err(err),
        };
        if read == 0 {
            return Ok(ReadOutcome::Incomplete {
                expected: content_length,
                received: body.len(),
            });
        }
        let take = read.min(content_length - body.len());
        body.extend_from_slice(&buf[..take]);
    }

    Ok(ReadOutcome::Request(HttpRequest {
        method,
        target,
        headers,
        body,
    }))
}

/// Path component of a request target, without the query.
pub(crate) fn normalize_path(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw.split('?').next().unwrap_or(raw).trim();
    if raw.is_empty() {
        return "/".to_string();
    }
    let trimmed = raw.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// First non-empty value of `key` in the query of a request target, taken verbatim.
pub(crate) fn query_value<'a>(target: &'a str, key: &str) -> Option<&'a str> {
    let (_, query) = target.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == key)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

pub(crate) fn write_api_error(
    stream: &mut TcpStream,
    status: &str,
    code: &str,
    message: &str,
) -> std::io::Result<()> {
    let body = json!({
        "error": {
            "code": code,
            "message": message,
        }
    })
    .to_string();
    write_response(
        stream,
        status,
        "application/json; charset=utf-8",
        body.as_bytes(),
    )
}

pub(crate) fn write_response(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    body: &[u8],
) -> std::io::Result<()> {
    let length = body.len().to_string();
    let head = [
        ("Content-Type", content_type),
        ("Content-Length", length.as_str()),
        ("Cache-Control", "no-store"),
        ("Connection", "close"),
    ]
    .iter()
    .fold(format!("HTTP/1.1 {status}\r\n"), |mut head, (name, value)| {
        head.push_str(&format!("{name}: {value}\r\n"));
        head
    });
    stream.write_all(head.as_bytes())?;
    stream.write_all(b"\r\n")?;
    stream.write_all(body)?;
    stream.flush()
}
