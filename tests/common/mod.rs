#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

/// Two valid segments around one all-invalid segment.
pub const SURVEY_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="sounder" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Survey</name>
    <trkseg>
      <trkpt lat="48.30000" lon="-4.50000">
        <time>2024-06-01T10:10:00Z</time>
        <extensions><depth>15.0</depth></extensions>
      </trkpt>
      <trkpt lat="48.30100" lon="-4.50100">
        <time>2024-06-01T10:00:00Z</time>
        <extensions><depth>12.0</depth></extensions>
      </trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="48.40000" lon="-4.60000">
        <time>2024-06-01T10:30:00Z</time>
      </trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="48.50000" lon="-4.70000">
        <time>2024-06-01T11:00:00Z</time>
        <extensions><depth>8.4</depth></extensions>
      </trkpt>
      <trkpt lat="48.50200" lon="-4.70200">
        <time>2024-06-01T11:20:00Z</time>
        <extensions><depth>8.9</depth></extensions>
      </trkpt>
    </trkseg>
  </trk>
</gpx>
"#;

/// Heights covering 2024-06-01 10:00 to 10:10 UTC.
pub const TIDES_JSON: &str = r#"{"status":200,"callCount":1,"heights":[{"dt":1717236000,"date":"2024-06-01T10:00+0000","height":1.0},{"dt":1717236600,"date":"2024-06-01T10:10+0000","height":2.0}]}"#;

/// Serve canned HTTP responses, one per accepted connection, in order.
///
/// Returns the base URL and the request lines received so far.
pub fn serve(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    thread::spawn(move || {
        for (status, body) in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut raw = Vec::new();
            let mut chunk = [0u8; 1024];
            while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => raw.extend_from_slice(&chunk[..n]),
                }
            }
            let head = String::from_utf8_lossy(&raw);
            let line = head.lines().next().unwrap_or_default().to_string();
            seen.lock().unwrap().push(line);

            let reason = if status == 200 { "OK" } else { "Error" };
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });

    (format!("http://{}", addr), requests)
}
