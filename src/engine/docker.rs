use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper::{Method, Request, Response, StatusCode};
use tower::Service;

use super::models::{
    ContainerInspect, ContainerSummary, LogLine, LogSource, StatsSample, TopResponse,
};
use super::unix::UnixConnector;
use super::{Engine, Error, ListFilter, LogStream, Result, StatsStream};
use crate::container::{ContainerID, Process};

/// `ps` arguments for the process table, the columns map onto [`Process`].
const TOP_PS_ARGS: &str = "-eo pid,ppid,thcount,rss,%cpu,cmd";

/// Content type of a log stream whose frames carry a stream header.
const MULTIPLEXED_STREAM: &str = "application/vnd.docker.multiplexed-stream";

/// Size of the header in front of every multiplexed log frame.
const FRAME_HEADER_LEN: usize = 8;

/// Default location of the engine socket.
pub const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

/// Engine client speaking HTTP/1.1 over the engine's Unix socket.
///
/// Every request opens its own connection, so a long-lived stats stream never
/// blocks request/response calls for the same or other containers.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    connector: UnixConnector,
}

impl DockerEngine {
    /// Creates a client and verifies the engine answers on `socket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be reached or the engine does not
    /// answer the ping.
    pub async fn connect(socket: impl AsRef<Path>) -> Result<Self> {
        let engine = Self::new(socket);
        engine.ping().await?;
        log::debug!(
            "Connected to container engine at {}",
            engine.connector.path().display()
        );
        Ok(engine)
    }

    /// Creates a client without contacting the engine.
    pub fn new(socket: impl AsRef<Path>) -> Self {
        Self {
            connector: UnixConnector::new(socket),
        }
    }

    /// Resolves the engine socket from a `DOCKER_HOST` style value.
    ///
    /// Only `unix://` hosts are supported; anything else falls back to [`DEFAULT_SOCKET`].
    pub fn socket_from_host(host: Option<&str>) -> PathBuf {
        match host.and_then(|host| host.strip_prefix("unix://")) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => {
                if let Some(host) = host {
                    log::warn!("unsupported engine host `{host}`, using {DEFAULT_SOCKET}");
                }
                PathBuf::from(DEFAULT_SOCKET)
            }
        }
    }

    pub async fn ping(&self) -> Result<()> {
        self.send(Method::GET, "/_ping").await?;
        Ok(())
    }

    /// Sends a request on a fresh connection and returns the response once its
    /// status is known, together with the task driving the connection.
    async fn open(
        &self,
        method: Method,
        path: &str,
    ) -> Result<(Response<Incoming>, tokio::task::JoinHandle<()>)> {
        let mut connector = self.connector.clone();
        let socket_err = |source| Error::SocketConnect {
            path: self.connector.path().to_path_buf(),
            source,
        };
        std::future::poll_fn(|cx| connector.poll_ready(cx))
            .await
            .map_err(socket_err)?;
        let io = connector
            .call(hyper::Uri::from_static("http://localhost/"))
            .await
            .map_err(socket_err)?;

        let (mut sender, connection) = http1::handshake(io).await.map_err(Error::Handshake)?;
        let connection = tokio::spawn(async move {
            if let Err(err) = connection.await {
                log::debug!("engine connection closed with error: {err}");
            }
        });

        let request = Request::builder()
            .method(method)
            .uri(path)
            .header(hyper::header::HOST, "docker")
            .body(Empty::<Bytes>::new())
            .map_err(|err| Error::InvalidRequest(err.to_string()))?;
        log::trace!("{} {}", request.method(), request.uri());

        let response = sender.send_request(request).await.map_err(Error::Request)?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_MODIFIED {
            return Ok((response, connection));
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(Error::Body)?
            .to_bytes();
        Err(Error::Api {
            status: status.as_u16(),
            message: api_message(&body),
        })
    }

    /// Sends a request and collects the whole response body.
    async fn send(&self, method: Method, path: &str) -> Result<Bytes> {
        let (response, _connection) = self.open(method, path).await?;
        Ok(response
            .into_body()
            .collect()
            .await
            .map_err(Error::Body)?
            .to_bytes())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.send(Method::GET, path).await?;
        serde_json::from_slice(&body).map_err(Error::Decode)
    }

    async fn post(&self, id: &ContainerID, action: &str) -> Result<()> {
        log::debug!("{action} container {id}");
        self.send(Method::POST, &format!("/containers/{id}/{action}"))
            .await?;
        Ok(())
    }
}

/// Extracts the `message` of an engine error body, falling back to the raw text.
fn api_message(body: &[u8]) -> String {
    #[derive(serde::Deserialize)]
    struct ApiError {
        message: String,
    }

    match serde_json::from_slice::<ApiError>(body) {
        Ok(err) => err.message,
        Err(_) => String::from_utf8_lossy(body).trim().to_owned(),
    }
}

/// Builds the query string for `GET /containers/json`.
fn list_query(filter: &ListFilter) -> Result<String> {
    match filter {
        ListFilter::All => Ok("/containers/json?all=1".to_owned()),
        ListFilter::Label { key, value } => {
            let filters = serde_json::json!({ "label": [format!("{key}={value}")] });
            let filters = serde_json::to_string(&filters).map_err(Error::Encode)?;
            Ok(format!(
                "/containers/json?all=1&filters={}",
                urlencoding::encode(&filters)
            ))
        }
    }
}

impl Engine for DockerEngine {
    type Stats = DockerStatsStream;
    type Logs = DockerLogStream;

    async fn list_containers(&self, filter: &ListFilter) -> Result<Vec<ContainerSummary>> {
        self.get_json(&list_query(filter)?).await
    }

    async fn inspect(&self, id: &ContainerID) -> Result<ContainerInspect> {
        self.get_json(&format!("/containers/{id}/json")).await
    }

    async fn top(&self, id: &ContainerID) -> Result<Vec<Process>> {
        let top: TopResponse = self
            .get_json(&format!(
                "/containers/{id}/top?ps_args={}",
                urlencoding::encode(TOP_PS_ARGS)
            ))
            .await?;
        Ok(top.into_processes())
    }

    async fn stats(&self, id: &ContainerID) -> Result<DockerStatsStream> {
        let (response, connection) = self
            .open(Method::GET, &format!("/containers/{id}/stats?stream=1"))
            .await?;
        Ok(DockerStatsStream {
            body: response.into_body(),
            buffer: BytesMut::new(),
            finished: false,
            connection,
        })
    }

    async fn logs(&self, id: &ContainerID, tail: usize) -> Result<DockerLogStream> {
        let (response, connection) = self
            .open(
                Method::GET,
                &format!("/containers/{id}/logs?follow=1&stdout=1&stderr=1&tail={tail}"),
            )
            .await?;
        let framing = match response.headers().get(hyper::header::CONTENT_TYPE) {
            Some(value) if value.as_bytes() == MULTIPLEXED_STREAM.as_bytes() => {
                Some(Framing::Multiplexed)
            }
            _ => None,
        };
        Ok(DockerLogStream {
            body: response.into_body(),
            buffer: BytesMut::new(),
            framing,
            finished: false,
            connection,
        })
    }

    async fn start(&self, id: &ContainerID) -> Result<()> {
        self.post(id, "start").await
    }

    async fn stop(&self, id: &ContainerID) -> Result<()> {
        self.post(id, "stop").await
    }

    async fn pause(&self, id: &ContainerID) -> Result<()> {
        self.post(id, "pause").await
    }

    async fn unpause(&self, id: &ContainerID) -> Result<()> {
        self.post(id, "unpause").await
    }
}

/// Newline-delimited JSON stats stream of one container.
///
/// Each line is decoded on its own, so one malformed object is reported as a
/// single decode error and the following lines still decode.
#[derive(Debug)]
pub struct DockerStatsStream {
    body: Incoming,
    buffer: BytesMut,
    finished: bool,
    connection: tokio::task::JoinHandle<()>,
}

impl DockerStatsStream {
    fn next_line(&mut self) -> Option<BytesMut> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        Some(self.buffer.split_to(pos + 1))
    }
}

fn decode_line(line: &[u8]) -> Option<Result<StatsSample>> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_slice(line).map_err(Error::Decode))
}

impl StatsStream for DockerStatsStream {
    async fn next_sample(&mut self) -> Option<Result<StatsSample>> {
        loop {
            while let Some(line) = self.next_line() {
                if let Some(sample) = decode_line(&line) {
                    return Some(sample);
                }
            }

            if self.finished {
                let rest = self.buffer.split();
                return decode_line(&rest);
            }

            match self.body.frame().await {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        self.buffer.extend_from_slice(&data);
                    }
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(Error::Body(err)));
                }
                None => self.finished = true,
            }
        }
    }
}

impl Drop for DockerStatsStream {
    fn drop(&mut self) {
        self.connection.abort();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// 8 byte header (stream, 3 zero bytes, big-endian length) before each payload.
    Multiplexed,
    /// Plain output of a container with a TTY.
    Raw,
}

impl Framing {
    /// Older engines label multiplexed output as a raw stream, so the first
    /// header is sniffed when the content type does not say.
    fn detect(head: &[u8]) -> Self {
        match head {
            [stream, 0, 0, 0, ..] if LogSource::from_header(*stream).is_some() => {
                Self::Multiplexed
            }
            _ => Self::Raw,
        }
    }
}

/// Followed output of one container.
#[derive(Debug)]
pub struct DockerLogStream {
    body: Incoming,
    buffer: BytesMut,
    framing: Option<Framing>,
    finished: bool,
    connection: tokio::task::JoinHandle<()>,
}

impl DockerLogStream {
    fn next_buffered(&mut self) -> Option<Result<LogLine>> {
        let framing = match self.framing {
            Some(framing) => framing,
            None if self.buffer.len() >= FRAME_HEADER_LEN || self.finished => {
                let framing = Framing::detect(&self.buffer);
                self.framing = Some(framing);
                framing
            }
            None => return None,
        };

        match framing {
            Framing::Multiplexed => {
                if self.buffer.len() < FRAME_HEADER_LEN {
                    return None;
                }
                let len = u32::from_be_bytes([
                    self.buffer[4],
                    self.buffer[5],
                    self.buffer[6],
                    self.buffer[7],
                ]) as usize;
                if self.buffer.len() < FRAME_HEADER_LEN + len {
                    return None;
                }
                let header = self.buffer.split_to(FRAME_HEADER_LEN);
                let payload = self.buffer.split_to(len);
                let source = LogSource::from_header(header[0]).unwrap_or(LogSource::Stdout);
                Some(Ok(LogLine::new(source, &payload)))
            }
            Framing::Raw => {
                let pos = self.buffer.iter().position(|b| *b == b'\n')?;
                let line = self.buffer.split_to(pos + 1);
                Some(Ok(LogLine::new(LogSource::Stdout, &line)))
            }
        }
    }
}

impl LogStream for DockerLogStream {
    async fn next_line(&mut self) -> Option<Result<LogLine>> {
        loop {
            if let Some(line) = self.next_buffered() {
                return Some(line);
            }

            if self.finished {
                if self.buffer.is_empty() {
                    return None;
                }
                let rest = self.buffer.split();
                return match self.framing {
                    Some(Framing::Multiplexed) => Some(Err(Error::TruncatedLogFrame(rest.len()))),
                    _ => Some(Ok(LogLine::new(LogSource::Stdout, &rest))),
                };
            }

            match self.body.frame().await {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        self.buffer.extend_from_slice(&data);
                    }
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(Error::Body(err)));
                }
                None => self.finished = true,
            }
        }
    }
}

impl Drop for DockerLogStream {
    fn drop(&mut self) {
        self.connection.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    /// Accepts a single connection, answers with `response` and returns the request head.
    fn serve_once(listener: UnixListener, response: String) -> tokio::task::JoinHandle<String> {
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            String::from_utf8(head).unwrap()
        })
    }

    fn close_delimited(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{body}"
        )
    }

    fn engine_with_listener() -> (tempfile::TempDir, DockerEngine, UnixListener) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.sock");
        let listener = UnixListener::bind(&path).unwrap();
        (dir, DockerEngine::new(&path), listener)
    }

    #[test]
    fn test_socket_from_host() {
        assert_eq!(
            DockerEngine::socket_from_host(Some("unix:///run/user/1000/docker.sock")),
            PathBuf::from("/run/user/1000/docker.sock")
        );
        assert_eq!(
            DockerEngine::socket_from_host(Some("tcp://10.0.0.1:2375")),
            PathBuf::from(DEFAULT_SOCKET)
        );
        assert_eq!(
            DockerEngine::socket_from_host(None),
            PathBuf::from(DEFAULT_SOCKET)
        );
    }

    #[test]
    fn test_list_query() {
        assert_eq!(list_query(&ListFilter::All).unwrap(), "/containers/json?all=1");
        let query = list_query(&ListFilter::Label {
            key: "com.docker.compose.project".to_owned(),
            value: "shop".to_owned(),
        })
        .unwrap();
        assert_eq!(
            query,
            "/containers/json?all=1&filters=%7B%22label%22%3A%5B%22com.docker.compose.project%3Dshop%22%5D%7D"
        );
    }

    #[test]
    fn test_api_message() {
        assert_eq!(
            api_message(br#"{"message": "No such container: abc"}"#),
            "No such container: abc"
        );
        assert_eq!(api_message(b"page not found\n"), "page not found");
    }

    #[tokio::test]
    async fn test_list_containers() {
        let (_dir, engine, listener) = engine_with_listener();
        let server = serve_once(
            listener,
            close_delimited(
                "200 OK",
                r#"[{"Id": "abc", "Names": ["/shop-web-1"], "Image": "nginx", "State": "running"}]"#,
            ),
        );

        let containers = engine.list_containers(&ListFilter::All).await.unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id, "abc");
        assert_eq!(containers[0].primary_name(), "shop-web-1");

        let head = server.await.unwrap();
        assert!(head.starts_with("GET /containers/json?all=1 HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn test_inspect_not_found() {
        let (_dir, engine, listener) = engine_with_listener();
        let server = serve_once(
            listener,
            close_delimited("404 Not Found", r#"{"message": "No such container: abc"}"#),
        );

        let id = ContainerID::new("abc").unwrap();
        let err = engine.inspect(&id).await.unwrap_err();
        assert!(err.is_not_found());
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "No such container: abc");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_top_request_path() {
        let (_dir, engine, listener) = engine_with_listener();
        let server = serve_once(
            listener,
            close_delimited(
                "200 OK",
                r#"{"Titles": ["PID", "PPID", "THCNT", "RSS", "%CPU", "CMD"], "Processes": [["1", "0", "1", "512", "0.0", "sleep"]]}"#,
            ),
        );

        let id = ContainerID::new("abc").unwrap();
        let processes = engine.top(&id).await.unwrap();
        assert_eq!(processes.len(), 1);
        assert_eq!(processes[0].cmd, "sleep");

        let head = server.await.unwrap();
        assert!(head.starts_with(
            "GET /containers/abc/top?ps_args=-eo%20pid%2Cppid%2Cthcount%2Crss%2C%25cpu%2Ccmd HTTP/1.1"
        ));
    }

    #[tokio::test]
    async fn test_stats_stream_skips_malformed_line() {
        let (_dir, engine, listener) = engine_with_listener();
        let body = concat!(
            r#"{"cpu_stats": {"cpu_usage": {"total_usage": 100}, "system_cpu_usage": 1000, "online_cpus": 2}}"#,
            "\n",
            r#"{"cpu_stats": oops"#,
            "\n\n",
            r#"{"cpu_stats": {"cpu_usage": {"total_usage": 150}, "system_cpu_usage": 1100, "online_cpus": 2}}"#,
        );
        let server = serve_once(listener, close_delimited("200 OK", body));

        let id = ContainerID::new("abc").unwrap();
        let mut stream = engine.stats(&id).await.unwrap();

        let first = stream.next_sample().await.unwrap().unwrap();
        assert_eq!(first.cpu_stats.cpu_usage.total_usage, 100);
        assert!(matches!(
            stream.next_sample().await,
            Some(Err(Error::Decode(_)))
        ));
        let last = stream.next_sample().await.unwrap().unwrap();
        assert_eq!(last.cpu_stats.system_cpu_usage, 1100);
        assert!(stream.next_sample().await.is_none());

        let head = server.await.unwrap();
        assert!(head.starts_with("GET /containers/abc/stats?stream=1 HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_post_not_modified_is_ok() {
        let (_dir, engine, listener) = engine_with_listener();
        let server = serve_once(
            listener,
            "HTTP/1.1 304 Not Modified\r\nConnection: close\r\n\r\n".to_owned(),
        );

        let id = ContainerID::new("abc").unwrap();
        engine.start(&id).await.unwrap();
        let head = server.await.unwrap();
        assert!(head.starts_with("POST /containers/abc/start HTTP/1.1"));
    }

    fn log_response(content_type: &str, body: &str) -> String {
        format!("HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nConnection: close\r\n\r\n{body}")
    }

    fn frame(stream: u8, payload: &str) -> String {
        let mut frame = String::new();
        frame.push(char::from(stream));
        frame.push_str("\0\0\0");
        for byte in (payload.len() as u32).to_be_bytes() {
            frame.push(char::from(byte));
        }
        frame.push_str(payload);
        frame
    }

    #[tokio::test]
    async fn test_logs_multiplexed() {
        let (_dir, engine, listener) = engine_with_listener();
        let body = frame(1, "listening on :80\n") + &frame(2, "warning: no config\n");
        let server = serve_once(listener, log_response(MULTIPLEXED_STREAM, &body));

        let id = ContainerID::new("abc").unwrap();
        let mut logs = engine.logs(&id, 50).await.unwrap();
        let first = logs.next_line().await.unwrap().unwrap();
        assert_eq!(first.source, LogSource::Stdout);
        assert_eq!(first.text, "listening on :80");
        let second = logs.next_line().await.unwrap().unwrap();
        assert_eq!(second.source, LogSource::Stderr);
        assert_eq!(second.text, "warning: no config");
        assert!(logs.next_line().await.is_none());

        let head = server.await.unwrap();
        assert!(head.starts_with(
            "GET /containers/abc/logs?follow=1&stdout=1&stderr=1&tail=50 HTTP/1.1"
        ));
    }

    #[tokio::test]
    async fn test_logs_sniffs_frames_behind_raw_content_type() {
        let (_dir, engine, listener) = engine_with_listener();
        let body = frame(2, "boom\n");
        let server = serve_once(
            listener,
            log_response("application/vnd.docker.raw-stream", &body),
        );

        let id = ContainerID::new("abc").unwrap();
        let mut logs = engine.logs(&id, 10).await.unwrap();
        let line = logs.next_line().await.unwrap().unwrap();
        assert_eq!(line.source, LogSource::Stderr);
        assert_eq!(line.text, "boom");
        assert!(logs.next_line().await.is_none());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_logs_raw_tty_output() {
        let (_dir, engine, listener) = engine_with_listener();
        let server = serve_once(
            listener,
            log_response("application/vnd.docker.raw-stream", "line one\r\nline two"),
        );

        let id = ContainerID::new("abc").unwrap();
        let mut logs = engine.logs(&id, 10).await.unwrap();
        assert_eq!(logs.next_line().await.unwrap().unwrap().text, "line one");
        assert_eq!(logs.next_line().await.unwrap().unwrap().text, "line two");
        assert!(logs.next_line().await.is_none());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_logs_truncated_frame() {
        let (_dir, engine, listener) = engine_with_listener();
        let mut body = frame(1, "complete\n");
        body.push_str(&frame(1, "cut short\n")[..12]);
        let server = serve_once(listener, log_response(MULTIPLEXED_STREAM, &body));

        let id = ContainerID::new("abc").unwrap();
        let mut logs = engine.logs(&id, 10).await.unwrap();
        assert_eq!(logs.next_line().await.unwrap().unwrap().text, "complete");
        assert!(matches!(
            logs.next_line().await,
            Some(Err(Error::TruncatedLogFrame(12)))
        ));
        assert!(logs.next_line().await.is_none());
        server.await.unwrap();
    }
}
