//! InfluxDB 1.x HTTP writer.

use std::time::Duration;

use esr31_core::{MeasurementSink, SinkError, SinkRecord, line_protocol};
use reqwest::blocking::Client;
use tracing::debug;

use crate::config::InfluxConfig;

/// Posts line protocol to `http://host:port/write?db=DATABASE`.
pub struct InfluxHttpSink {
    client: Client,
    url: String,
    database: String,
}

impl InfluxHttpSink {
    pub fn new(config: &InfluxConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| SinkError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            url: format!("http://{}:{}/write", config.host, config.port),
            database: config.database.clone(),
        })
    }
}

impl MeasurementSink for InfluxHttpSink {
    fn write(&mut self, records: &[SinkRecord]) -> Result<(), SinkError> {
        let body = line_protocol::render(records);
        debug!(url = %self.url, db = %self.database, bytes = body.len(), "posting points");
        let response = self
            .client
            .post(&self.url)
            .query(&[("db", self.database.as_str())])
            .body(body)
            .send()
            .map_err(|err| SinkError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use esr31_core::{FieldValue, MeasurementSink, SinkError, SinkRecord};

    use super::InfluxHttpSink;
    use crate::config::InfluxConfig;

    /// Answers one request with `status_line` and returns what it received.
    fn serve_once(status_line: &'static str, body: &'static str) -> (u16, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("respond");
            request
        });
        (port, handle)
    }

    fn read_request(stream: &mut impl Read) -> String {
        let mut data = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).expect("read");
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    fn config(port: u16) -> InfluxConfig {
        InfluxConfig {
            host: "127.0.0.1".into(),
            port,
            ..InfluxConfig::default()
        }
    }

    fn records() -> Vec<SinkRecord> {
        vec![
            SinkRecord {
                measurement: "SOLART1".into(),
                fields: BTreeMap::from([("temp".to_string(), FieldValue::Float(23.4))]),
            },
            SinkRecord {
                measurement: "SOLARO1".into(),
                fields: BTreeMap::from([("state".to_string(), FieldValue::Integer(1))]),
            },
        ]
    }

    #[test]
    fn posts_line_protocol_to_database() {
        let (port, server) = serve_once("204 No Content", "");
        let mut sink = InfluxHttpSink::new(&config(port)).unwrap();
        sink.write(&records()).unwrap();

        let request = server.join().expect("server thread");
        assert!(request.starts_with("POST /write?db=hotwater "), "{request}");
        assert!(request.ends_with("SOLART1 temp=23.4\nSOLARO1 state=1i\n"), "{request}");
    }

    #[test]
    fn error_status_is_rejected() {
        let (port, server) = serve_once("404 Not Found", "database not found: \"hotwater\"\n");
        let mut sink = InfluxHttpSink::new(&config(port)).unwrap();
        let err = sink.write(&records()).unwrap_err();
        server.join().expect("server thread");

        match err {
            SinkError::Rejected { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("database not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unreachable_server_is_transport_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let mut sink = InfluxHttpSink::new(&config(port)).unwrap();
        let err = sink.write(&records()).unwrap_err();
        assert!(matches!(err, SinkError::Transport(_)));
    }
}
