#![allow(dead_code)]

use async_trait::async_trait;
use report_extract::error::AppError;
use report_extract::store::MemoryStore;
use report_extract::{AppResult, ExtractedReport, FieldKey, FieldRequester, ReportStore};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// 按字段返回预设结果的请求器
#[derive(Default)]
pub struct ScriptedRequester {
    answers: HashMap<FieldKey, Value>,
    delay: Duration,
    calls: AtomicUsize,
    order: Mutex<Vec<FieldKey>>,
}

impl ScriptedRequester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, key: FieldKey, value: Value) -> Self {
        self.answers.insert(key, value);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn order(&self) -> Vec<FieldKey> {
        self.order.lock().unwrap().clone()
    }
}

#[async_trait]
impl FieldRequester for ScriptedRequester {
    async fn request(&self, _report_id: &str, key: FieldKey) -> Option<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.order.lock().unwrap().push(key);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answers.get(&key).cloned()
    }
}

/// 记录写入次数的存储，可设置为写入失败
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
    fail_writes: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportStore for RecordingStore {
    async fn get(&self, id: &str) -> AppResult<Option<ExtractedReport>> {
        self.inner.get(id).await
    }

    async fn set(&self, id: &str, report: &ExtractedReport) -> AppResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(AppError::store_write_failed(
                id,
                io::Error::new(io::ErrorKind::Other, "disk full"),
            ));
        }
        self.inner.set(id, report).await
    }
}

pub fn loaded_report(id: &str) -> ExtractedReport {
    let mut report = ExtractedReport::skeleton(id);
    report.is_loaded = true;
    report
}

/// 收到的 HTTP 请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_line: String,
    pub body: String,
}

/// 启动一个按顺序返回预设响应的 HTTP 桩服务，每个连接处理一个请求
///
/// 返回服务地址和已收到的请求
pub async fn spawn_stub(
    responses: Vec<(u16, String)>,
) -> (String, std::sync::Arc<Mutex<Vec<RecordedRequest>>>) {
    use tokio::io::AsyncWriteExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = std::sync::Arc::new(Mutex::new(Vec::new()));
    let sink = recorded.clone();

    tokio::spawn(async move {
        for (status, body) in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            if let Some(request) = read_request(&mut socket).await {
                sink.lock().unwrap().push(request);
            }
            let response = format!(
                "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{}", addr), recorded)
}

/// 启动一个只接受连接、从不响应的服务
pub async fn spawn_silent() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    use tokio::io::AsyncReadExt;

    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        let Some(header_end) = text.find("\r\n\r\n") else {
            continue;
        };
        let headers = &text[..header_end];
        let content_length = headers
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let body_start = header_end + 4;
        if buf.len() >= body_start + content_length {
            let body = String::from_utf8_lossy(&buf[body_start..body_start + content_length]);
            return Some(RecordedRequest {
                request_line: headers.lines().next().unwrap_or_default().to_string(),
                body: body.to_string(),
            });
        }
    }
}
