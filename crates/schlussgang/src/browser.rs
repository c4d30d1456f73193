use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("WebDriver error '{error}': {message}")]
    WebDriver { error: String, message: String },
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("{0} is not supported by this browser")]
    Unsupported(&'static str),
    #[error("No page loaded")]
    NoPage,
}

/// The page-rendering collaborator every scrape pipeline drives.
///
/// One instance is one session: it is opened before the run and released
/// with [`Browser::close`] when the run ends.
#[async_trait]
pub trait Browser: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Runs `script` in the current document and returns its JSON result.
    async fn execute(&mut self, script: &str) -> Result<Value, BrowserError>;

    async fn page_source(&mut self) -> Result<String, BrowserError>;

    /// Whether the page can change after load (scrolling, lazy content).
    fn renders_scripts(&self) -> bool {
        true
    }

    async fn close(&mut self) -> Result<(), BrowserError>;
}

fn user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKind {
    Firefox,
    Chrome,
}

#[derive(Debug, Clone)]
pub struct WebDriverOptions {
    pub endpoint: String,
    pub kind: BrowserKind,
    pub headless: bool,
    pub page_load_timeout: Duration,
}

impl Default for WebDriverOptions {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4444".to_string(),
            kind: BrowserKind::Firefox,
            headless: false,
            page_load_timeout: Duration::from_secs(30),
        }
    }
}

impl WebDriverOptions {
    fn capabilities(&self) -> Value {
        match self.kind {
            BrowserKind::Firefox => {
                let mut args = vec![];
                if self.headless {
                    args.push("-headless");
                }
                json!({
                    "browserName": "firefox",
                    "moz:firefoxOptions": {
                        "args": args,
                        "prefs": { "javascript.enabled": true },
                    },
                })
            }
            BrowserKind::Chrome => {
                let mut args = vec!["--no-sandbox", "--disable-dev-shm-usage"];
                if self.headless {
                    args.push("--headless=new");
                }
                json!({
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args },
                })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    value: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewSession {
    session_id: String,
}

fn wire_error(status: StatusCode, value: &Value) -> BrowserError {
    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("status {}", status));

    match error.as_str() {
        "timeout" | "script timeout" => BrowserError::Timeout(message),
        _ => BrowserError::WebDriver { error, message },
    }
}

async fn decode(response: reqwest::Response) -> Result<Value, BrowserError> {
    let status = response.status();
    let body: WireResponse = response
        .json()
        .await
        .inspect_err(|e| log::error!("Decode error: {e:?}"))?;
    if !status.is_success() {
        return Err(wire_error(status, &body.value));
    }
    Ok(body.value)
}

/// A W3C WebDriver session (geckodriver, chromedriver) driven over HTTP.
#[derive(Debug)]
pub struct WebDriverBrowser {
    client: Client,
    endpoint: String,
    session_id: String,
    closed: bool,
}

impl WebDriverBrowser {
    pub async fn connect(options: &WebDriverOptions) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .timeout(options.page_load_timeout + Duration::from_secs(30))
            .user_agent(user_agent())
            .build()?;
        let endpoint = options.endpoint.trim_end_matches('/').to_string();

        log::info!("Creating WebDriver session at {}", endpoint);
        let response = client
            .post(format!("{}/session", endpoint))
            .json(&json!({ "capabilities": { "alwaysMatch": options.capabilities() } }))
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;
        let value = decode(response).await?;
        let session: NewSession = serde_json::from_value(value)
            .map_err(|e| BrowserError::UnexpectedResponse(format!("new session: {e}")))?;

        let mut browser = Self {
            client,
            endpoint,
            session_id: session.session_id,
            closed: false,
        };
        let timeouts = json!({ "pageLoad": options.page_load_timeout.as_millis() as u64 });
        if let Err(e) = browser
            .command(Method::POST, "/timeouts", Some(timeouts))
            .await
        {
            log::error!(
                "Configuring WebDriver session {} failed: {}",
                browser.session_id,
                e
            );
            if let Err(delete_err) = browser.close().await {
                log::warn!(
                    "Failed to delete WebDriver session {}: {}",
                    browser.session_id,
                    delete_err
                );
            }
            return Err(e);
        }
        log::info!("WebDriver session {} ready", browser.session_id);

        Ok(browser)
    }

    fn session_url(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.endpoint, self.session_id, path)
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, BrowserError> {
        let url = self.session_url(path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;
        decode(response).await
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn execute(&mut self, script: &str) -> Result<Value, BrowserError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": [] })),
        )
        .await
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        match self.command(Method::GET, "/source", None).await? {
            Value::String(html) => Ok(html),
            other => Err(BrowserError::UnexpectedResponse(format!(
                "page source was {other}"
            ))),
        }
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        log::info!("Closing WebDriver session {}", self.session_id);
        self.closed = true;
        self.command(Method::DELETE, "", None).await?;
        Ok(())
    }
}

/// Sessions dropped without [`Browser::close`] (panic, early exit) are deleted
/// from a helper thread, since no async context is available here.
impl Drop for WebDriverBrowser {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        log::warn!(
            "WebDriver session {} was not closed, deleting it",
            self.session_id
        );

        let url = self.session_url("");
        let cleanup = std::thread::spawn(move || -> Result<(), String> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| e.to_string())?;
            runtime.block_on(async {
                let client = Client::builder()
                    .timeout(Duration::from_secs(5))
                    .build()
                    .map_err(|e| e.to_string())?;
                client
                    .delete(&url)
                    .send()
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(())
            })
        });

        match cleanup.join() {
            Ok(Ok(())) => log::info!("Deleted WebDriver session {}", self.session_id),
            Ok(Err(e)) => log::warn!("Failed to delete WebDriver session {}: {}", self.session_id, e),
            Err(_) => log::warn!("WebDriver cleanup thread panicked"),
        }
    }
}

/// Plain HTTP fetches for pages that render without script execution.
#[derive(Debug, Clone)]
pub struct HttpBrowser {
    client: Client,
    current: Option<String>,
}

impl HttpBrowser {
    pub fn new(timeout: Duration) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()?;

        Ok(Self {
            client,
            current: None,
        })
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.current = None;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;

        // A 404 body still carries the site's "not found" banner.
        let response = if response.status() == StatusCode::NOT_FOUND {
            log::debug!("{} answered 404", url);
            response
        } else {
            response.error_for_status()?
        };

        let html = response
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;
        self.current = Some(html);
        Ok(())
    }

    async fn execute(&mut self, _script: &str) -> Result<Value, BrowserError> {
        Err(BrowserError::Unsupported("script execution"))
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        self.current.clone().ok_or(BrowserError::NoPage)
    }

    fn renders_scripts(&self) -> bool {
        false
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.current = None;
        Ok(())
    }
}
