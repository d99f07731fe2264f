//! Headless Chrome renderer
//!
//! Launches a throwaway browser per conversion and drives it over the
//! DevTools protocol: open a target, navigate, wait for the network to
//! settle, then print to PDF.

use async_trait::async_trait;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::errors::RenderError;
use crate::domain::traits::{PageLayout, PdfRenderer};
use crate::infrastructure::config::RendererConfig;

const DEVTOOLS_PREFIX: &str = "DevTools listening on ";
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_TIMEOUT: Duration = Duration::from_secs(60);
const SETTLED_EVENT: &str = "networkAlmostIdle";

/// Pull the websocket endpoint out of a browser stderr line
pub fn devtools_endpoint(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix(DEVTOOLS_PREFIX)?;
    rest.starts_with("ws://").then_some(rest)
}

/// Page.printToPDF parameters for a layout
pub fn print_params(layout: &PageLayout) -> Value {
    json!({
        "paperWidth": PageLayout::to_inches(layout.width_mm),
        "paperHeight": PageLayout::to_inches(layout.height_mm),
        "marginTop": PageLayout::to_inches(layout.margin_top_mm),
        "marginRight": PageLayout::to_inches(layout.margin_right_mm),
        "marginBottom": PageLayout::to_inches(layout.margin_bottom_mm),
        "marginLeft": PageLayout::to_inches(layout.margin_left_mm),
        "printBackground": layout.print_background,
        "transferMode": "ReturnAsBase64",
    })
}

/// Chrome/Chromium driven over the DevTools protocol
pub struct ChromeRenderer {
    config: RendererConfig,
}

impl ChromeRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    async fn launch(&self, profile: &tempfile::TempDir) -> Result<(Child, String), RenderError> {
        let mut child = Command::new(&self.config.chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--remote-debugging-port=0")
            .arg(format!("--user-data-dir={}", profile.path().display()))
            .args(&self.config.extra_args)
            .arg("about:blank")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RenderError::Launch(format!("{}: {}", self.config.chrome_path.display(), e)))?;

        let stderr = child.stderr.take()
            .ok_or_else(|| RenderError::Launch("No stderr from browser".to_string()))?;
        let mut lines = BufReader::new(stderr).lines();

        let endpoint = tokio::time::timeout(LAUNCH_TIMEOUT, async {
            while let Some(line) = lines.next_line().await? {
                if let Some(endpoint) = devtools_endpoint(&line) {
                    return Ok::<_, std::io::Error>(Some(endpoint.to_string()));
                }
                tracing::debug!("browser: {}", line);
            }
            Ok::<_, std::io::Error>(None)
        })
        .await
        .map_err(|_| RenderError::Launch("Timed out waiting for DevTools endpoint".to_string()))?
        .map_err(|e| RenderError::Launch(e.to_string()))?
        .ok_or_else(|| RenderError::Launch("Browser exited before DevTools was ready".to_string()))?;

        // Keep draining stderr so the browser never blocks on a full pipe
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::trace!("browser: {}", line);
            }
        });

        Ok((child, endpoint))
    }

    async fn print(&self, cdp: &mut Cdp, url: &url::Url, layout: &PageLayout) -> Result<Vec<u8>, RenderError> {
        let target = cdp.call("Target.createTarget", json!({ "url": "about:blank" }), None).await?;
        let target_id = str_field(&target, "targetId")?;

        let attached = cdp.call(
            "Target.attachToTarget",
            json!({ "targetId": target_id, "flatten": true }),
            None,
        ).await?;
        let session = str_field(&attached, "sessionId")?;
        let session = Some(session.as_str());

        cdp.call("Page.enable", json!({}), session).await?;
        cdp.call("Page.setLifecycleEventsEnabled", json!({ "enabled": true }), session).await?;

        let navigation = cdp.call("Page.navigate", json!({ "url": url.as_str() }), session).await?;
        if let Some(error) = navigation.get("errorText").and_then(Value::as_str).filter(|e| !e.is_empty()) {
            return Err(RenderError::Navigation(format!("{}: {}", url, error)));
        }

        // Same-document navigations carry no loader
        if let Some(loader) = navigation.get("loaderId").and_then(Value::as_str) {
            let loader = loader.to_string();
            cdp.wait_for(PAGE_TIMEOUT, |event| {
                event["method"] == "Page.lifecycleEvent"
                    && event["params"]["name"] == SETTLED_EVENT
                    && event["params"]["loaderId"] == loader.as_str()
            })
            .await
            .map_err(|e| match e {
                RenderError::Protocol(msg) => RenderError::Navigation(msg),
                other => other,
            })?;
        }

        let printed = cdp.call("Page.printToPDF", print_params(layout), session)
            .await
            .map_err(|e| RenderError::Print(e.to_string()))?;
        let data = printed.get("data").and_then(Value::as_str)
            .ok_or_else(|| RenderError::Print("Missing PDF data".to_string()))?;

        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| RenderError::Print(e.to_string()))
    }
}

fn str_field(value: &Value, field: &str) -> Result<String, RenderError> {
    value.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RenderError::Protocol(format!("Missing {} in response", field)))
}

#[async_trait]
impl PdfRenderer for ChromeRenderer {
    async fn render(&self, url: &url::Url, layout: &PageLayout) -> Result<Vec<u8>, RenderError> {
        let profile = tempfile::tempdir().map_err(|e| RenderError::Launch(e.to_string()))?;
        let (mut child, endpoint) = self.launch(&profile).await?;
        tracing::debug!("Browser DevTools at {}", endpoint);

        let result = async {
            let mut cdp = Cdp::connect(&endpoint).await?;
            let pdf = self.print(&mut cdp, url, layout).await;
            cdp.close().await;
            pdf
        }
        .await;

        if let Err(e) = child.kill().await {
            tracing::debug!("Browser already gone: {}", e);
        }

        result
    }
}

/// Minimal DevTools client: request/response correlation plus an event buffer
struct Cdp {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
    events: VecDeque<Value>,
}

impl Cdp {
    async fn connect(endpoint: &str) -> Result<Self, RenderError> {
        let (ws, _) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| RenderError::Protocol(e.to_string()))?;

        Ok(Self {
            ws,
            next_id: 0,
            events: VecDeque::new(),
        })
    }

    async fn recv(&mut self) -> Result<Value, RenderError> {
        loop {
            let msg = self.ws.next()
                .await
                .ok_or_else(|| RenderError::Protocol("DevTools connection closed".to_string()))?
                .map_err(|e| RenderError::Protocol(e.to_string()))?;

            match msg {
                Message::Text(text) => {
                    return serde_json::from_str(&text)
                        .map_err(|e| RenderError::Protocol(e.to_string()));
                }
                Message::Close(_) => {
                    return Err(RenderError::Protocol("DevTools connection closed".to_string()));
                }
                _ => continue,
            }
        }
    }

    async fn call(&mut self, method: &str, params: Value, session: Option<&str>) -> Result<Value, RenderError> {
        self.next_id += 1;
        let id = self.next_id;

        let mut request = json!({ "id": id, "method": method, "params": params });
        if let Some(session) = session {
            request["sessionId"] = json!(session);
        }

        self.ws.send(Message::Text(request.to_string()))
            .await
            .map_err(|e| RenderError::Protocol(e.to_string()))?;

        let response = tokio::time::timeout(PAGE_TIMEOUT, async {
            loop {
                let msg = self.recv().await?;
                if msg.get("id").and_then(Value::as_u64) == Some(id) {
                    return Ok::<_, RenderError>(msg);
                }
                if msg.get("method").is_some() {
                    self.events.push_back(msg);
                }
            }
        })
        .await
        .map_err(|_| RenderError::Protocol(format!("{} timed out", method)))??;

        if let Some(error) = response.get("error") {
            let message = error.get("message").and_then(Value::as_str).unwrap_or("unknown error");
            return Err(RenderError::Protocol(format!("{}: {}", method, message)));
        }

        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn wait_for<F>(&mut self, timeout: Duration, matches: F) -> Result<Value, RenderError>
    where
        F: Fn(&Value) -> bool,
    {
        if let Some(pos) = self.events.iter().position(&matches) {
            return self.events.remove(pos)
                .ok_or_else(|| RenderError::Protocol("Event buffer changed".to_string()));
        }
        self.events.clear();

        tokio::time::timeout(timeout, async {
            loop {
                let msg = self.recv().await?;
                if matches(&msg) {
                    return Ok::<_, RenderError>(msg);
                }
            }
        })
        .await
        .map_err(|_| RenderError::Protocol("Timed out waiting for page to load".to_string()))?
    }

    async fn close(&mut self) {
        self.next_id += 1;
        let request = json!({ "id": self.next_id, "method": "Browser.close" });
        if let Err(e) = self.ws.send(Message::Text(request.to_string())).await {
            tracing::debug!("Browser.close failed: {}", e);
        }
    }
}
