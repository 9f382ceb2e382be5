//! Shared fixtures for unit tests.
use crate::record::{AttributeSet, MetadataRecord, ResultRecord, WorkItem};
use crate::vocab::AttributeKey;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

pub fn attributes(color: &str) -> AttributeSet {
    AttributeSet::from_labels([
        (AttributeKey::Color, color),
        (AttributeKey::Neckline, "v-neck"),
        (AttributeKey::Sleeve, "short sleeve"),
        (AttributeKey::Pattern, "floral"),
        (AttributeKey::Fabric, "cotton"),
        (AttributeKey::Fit, "relaxed fit"),
    ])
    .expect("valid attribute labels")
}

pub fn metadata(title: &str) -> MetadataRecord {
    MetadataRecord {
        title: title.to_string(),
        bullet_points: vec!["Soft cotton".to_string(), "Easy fit".to_string()],
        description: "A breezy floral top for warm days.".to_string(),
        style_summary: "Relaxed and summery.".to_string(),
        seo_tags: vec![
            "floral top".to_string(),
            "cotton blouse".to_string(),
            "summer".to_string(),
        ],
    }
}

pub fn record(id: &str) -> ResultRecord {
    ResultRecord {
        id: id.to_string(),
        attributes: attributes("red"),
        metadata: metadata(&format!("Floral top {id}")),
    }
}

pub fn work_item(dir: &Path, id: &str) -> WorkItem {
    WorkItem {
        id: id.to_string(),
        source: dir.join(id),
    }
}

/// One request received by [`serve`].
#[derive(Debug, Clone)]
pub struct Captured {
    pub path: String,
    pub body: String,
}

/// Answer exactly `connections` requests on a loopback port.
///
/// `respond` maps `(path, body)` to `(status, body)`. Returns the base URL and
/// a handle yielding the captured requests in arrival order.
pub fn serve<F>(connections: usize, respond: F) -> (String, JoinHandle<Vec<Captured>>)
where
    F: Fn(&str, &str) -> (u16, String) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));
    let handle = thread::spawn(move || {
        let mut captured = Vec::new();
        for _ in 0..connections {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut request_line = String::new();
            reader.read_line(&mut request_line).expect("read request line");
            let path = request_line
                .split_whitespace()
                .nth(1)
                .unwrap_or_default()
                .to_string();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read header");
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(value) = lower.strip_prefix("content-length:") {
                    content_length = value.trim().parse().expect("content length");
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).expect("read body");
            let body = String::from_utf8(body).expect("utf8 body");

            let (status, reply) = respond(&path, &body);
            let reason = if status == 200 { "OK" } else { "Error" };
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                reply.len()
            )
            .expect("write reply");
            stream.flush().expect("flush reply");
            captured.push(Captured { path, body });
        }
        captured
    });
    (base, handle)
}

/// A base URL nothing listens on.
pub fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let url = format!("http://{}", listener.local_addr().expect("addr"));
    drop(listener);
    url
}

/// Write a small decodable PNG named `id` into `dir`.
pub fn write_png(dir: &Path, id: &str) -> PathBuf {
    let path = dir.join(id);
    image::RgbImage::from_pixel(2, 2, image::Rgb([200, 30, 30]))
        .save(&path)
        .expect("write png");
    path
}
