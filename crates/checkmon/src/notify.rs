//! Notification transports for delivering alerts.

use crate::types::{Alert, Priority};
use async_trait::async_trait;
use common::{Error, MultiError, Result};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// A single notification transport.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short transport name for logs and error messages.
    fn name(&self) -> &str;

    /// Deliver one alert.
    async fn send(&self, alert: &Alert) -> Result<()>;
}

/// Fans an alert out to multiple transports.
///
/// Every transport is attempted even when an earlier one fails; the
/// failures are aggregated into a single [`MultiError`].
pub struct MultiNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
    name: String,
}

impl MultiNotifier {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        let name = Self::render_name(&notifiers);
        Self { notifiers, name }
    }

    /// Add a transport to the fan-out set.
    pub fn push(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.push(notifier);
        self.name = Self::render_name(&self.notifiers);
    }

    fn render_name(notifiers: &[Arc<dyn Notifier>]) -> String {
        let names: Vec<&str> = notifiers.iter().map(|n| n.name()).collect();
        format!("multi[{}]", names.join(", "))
    }
}

#[async_trait]
impl Notifier for MultiNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let mut errors = Vec::new();

        for notifier in &self.notifiers {
            if let Err(e) = notifier.send(alert).await {
                errors.push(Error::notify(format!("{}: {e}", notifier.name())));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MultiError { errors }.into())
        }
    }
}

/// Writes alerts to stdout. Useful for containers and log shipping.
pub struct StdoutNotifier {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl StdoutNotifier {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    /// Use a custom writer instead of stdout.
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl Default for StdoutNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for StdoutNotifier {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let mut line = format!(
            "[{}] [{}] [{}] {}",
            humantime::format_rfc3339_seconds(alert.timestamp),
            alert.priority.to_string().to_uppercase(),
            alert.check_name,
            alert.title,
        );
        if !alert.message.is_empty() {
            line.push_str(": ");
            line.push_str(&alert.message);
        }
        if !alert.tags.is_empty() {
            line.push_str(&format!(" [tags: {}]", alert.tags.join(", ")));
        }
        line.push('\n');

        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

const DEFAULT_NTFY_SERVER: &str = "https://ntfy.sh";

/// Push notifications via an ntfy.sh-compatible server.
pub struct NtfyNotifier {
    server: String,
    topic: String,
    client: reqwest::Client,
}

impl NtfyNotifier {
    pub fn new(topic: impl Into<String>) -> Result<Self> {
        Self::with_server(DEFAULT_NTFY_SERVER, topic)
    }

    pub fn with_server(server: impl Into<String>, topic: impl Into<String>) -> Result<Self> {
        Ok(Self {
            server: server.into().trim_end_matches('/').to_string(),
            topic: topic.into(),
            client: http_client()?,
        })
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    fn name(&self) -> &str {
        "ntfy"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let url = format!("{}/{}", self.server, self.topic);

        let mut request = self
            .client
            .post(&url)
            .header("Title", alert.title.as_str())
            .header("Priority", ntfy_priority(alert.priority))
            .body(alert.message.clone());
        if !alert.tags.is_empty() {
            request = request.header("Tags", alert.tags.join(","));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::notify(format!("send notification: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::notify(format!("ntfy returned status {status}")));
        }
        Ok(())
    }
}

fn ntfy_priority(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "2",
        Priority::Normal => "3",
        Priority::High => "4",
        Priority::Urgent => "5",
    }
}

const MAX_SMS_LEN: usize = 1600;

/// SMS via the Twilio messages API.
pub struct TwilioNotifier {
    account_sid: String,
    auth_token: String,
    from: String,
    to: String,
    client: reqwest::Client,
}

impl TwilioNotifier {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from: from.into(),
            to: to.into(),
            client: http_client()?,
        })
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    fn name(&self) -> &str {
        "twilio"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        let mut body = alert.title.clone();
        if !alert.message.is_empty() {
            body.push_str(": ");
            body.push_str(&alert.message);
        }
        let body = truncate_sms(body);

        let form = [
            ("To", self.to.as_str()),
            ("From", self.from.as_str()),
            ("Body", body.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::notify(format!("send SMS: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::notify(format!("twilio returned status {status}")));
        }
        Ok(())
    }
}

fn truncate_sms(body: String) -> String {
    if body.len() <= MAX_SMS_LEN {
        return body;
    }
    let mut end = MAX_SMS_LEN - 3;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Email via the SendGrid mail-send API.
pub struct SendGridNotifier {
    api_key: String,
    from: String,
    from_name: String,
    to: String,
    client: reqwest::Client,
}

impl SendGridNotifier {
    pub fn new(
        api_key: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            from: from.into(),
            from_name: "Checkmon Alerts".to_string(),
            to: to.into(),
            client: http_client()?,
        })
    }

    /// Set the sender display name.
    pub fn from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = name.into();
        self
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    fn name(&self) -> &str {
        "sendgrid"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let payload = serde_json::json!({
            "personalizations": [{ "to": [{ "email": self.to }] }],
            "from": { "email": self.from, "name": self.from_name },
            "subject": format!("[{}] {}", alert.check_name, alert.title),
            "content": [{ "type": "text/plain", "value": email_body(alert) }],
        });

        let response = self
            .client
            .post(SENDGRID_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::notify(format!("send email: {e}")))?;

        // SendGrid returns 202 Accepted on success.
        let status = response.status();
        if !status.is_success() {
            return Err(Error::notify(format!("sendgrid returned status {status}")));
        }
        Ok(())
    }
}

fn email_body(alert: &Alert) -> String {
    let mut body = format!(
        "Check: {}\nPriority: {}\nTime: {}\n\n{}",
        alert.check_name,
        alert.priority,
        humantime::format_rfc3339_seconds(alert.timestamp),
        alert.message,
    );

    if !alert.metadata.is_empty() {
        body.push_str("\n\nMetadata:\n");
        let mut keys: Vec<&String> = alert.metadata.keys().collect();
        keys.sort();
        for key in keys {
            body.push_str(&format!("  {}: {}\n", key, alert.metadata[key]));
        }
    }

    body
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(SEND_TIMEOUT)
        .build()
        .map_err(|e| Error::notify(format!("build HTTP client: {e}")))
}
