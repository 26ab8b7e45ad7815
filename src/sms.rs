//! SMS notifications: settings, templates, sending and the send log

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use reqwest::Client;

use autoshop_rust_sms::{render, HttpSmsGateway, SendResult, SmsGateway};

use crate::cache::OfflineCache;
use crate::error::{Error, Result};
use crate::models::{is_valid_mobile, normalize_mobile, SmsLog, SmsSendStatus, SmsSettings, SmsTemplate};
use crate::store::EntityStore;

/// Local-storage key of the SMS settings
pub const SETTINGS_KEY: &str = "sms_settings";

/// One recipient of a bulk send
#[derive(Debug, Clone, Default)]
pub struct Recipient {
    pub mobile: String,
    pub vars: HashMap<String, String>,
}

impl Recipient {
    pub fn new(mobile: &str) -> Self {
        Self {
            mobile: mobile.to_string(),
            vars: HashMap::new(),
        }
    }

    pub fn var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }
}

/// Result of [`SmsService::send_bulk`]
#[derive(Debug, Clone, Default)]
pub struct BulkReport {
    pub sent: usize,
    pub failed: usize,
    /// One log per recipient, in input order
    pub results: Vec<SmsLog>,
}

/// Sends texts through the configured gateway and logs every attempt
#[derive(Clone)]
pub struct SmsService {
    cache: OfflineCache,
    templates: EntityStore<SmsTemplate>,
    logs: EntityStore<SmsLog>,
    http_client: Client,
    default_base_url: Option<String>,
    gateway: Option<Arc<dyn SmsGateway>>,
}

impl SmsService {
    pub fn new(
        cache: OfflineCache,
        templates: EntityStore<SmsTemplate>,
        logs: EntityStore<SmsLog>,
        http_client: Client,
    ) -> Self {
        Self {
            cache,
            templates,
            logs,
            http_client,
            default_base_url: None,
            gateway: None,
        }
    }

    /// Vendor URL used when the saved settings leave it empty
    pub fn with_default_base_url(mut self, base_url: &str) -> Self {
        self.default_base_url = Some(base_url.to_string());
        self
    }

    /// Use this gateway instead of one built from the settings
    pub fn with_gateway(mut self, gateway: Arc<dyn SmsGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn templates(&self) -> &EntityStore<SmsTemplate> {
        &self.templates
    }

    pub fn logs(&self) -> &EntityStore<SmsLog> {
        &self.logs
    }

    /// Stored settings; defaults (disabled) when none were saved
    pub async fn settings(&self) -> Result<SmsSettings> {
        Ok(self.cache.read(SETTINGS_KEY).await?.unwrap_or_default())
    }

    pub async fn save_settings(&self, settings: &SmsSettings) -> Result<()> {
        self.cache.cache(SETTINGS_KEY, settings).await
    }

    async fn gateway(&self) -> Result<(Arc<dyn SmsGateway>, SmsSettings)> {
        let settings = self.settings().await?;
        if !settings.enabled {
            return Err(Error::SmsDisabled);
        }
        let gateway = match &self.gateway {
            Some(gateway) => gateway.clone(),
            None => {
                let base_url = match (&settings.base_url, &self.default_base_url) {
                    (url, _) if !url.is_empty() => url.as_str(),
                    (_, Some(url)) => url.as_str(),
                    _ => "",
                };
                if base_url.is_empty() || settings.api_key.is_empty() {
                    return Err(Error::config("SMS base URL and API key must be set"));
                }
                Arc::new(HttpSmsGateway::new(
                    base_url,
                    &settings.api_key,
                    self.http_client.clone(),
                ))
            }
        };
        Ok((gateway, settings))
    }

    /// Remaining vendor credit
    pub async fn balance(&self) -> Result<f64> {
        let (gateway, _) = self.gateway().await?;
        Ok(gateway.balance().await?)
    }

    /// Send one text. Vendor rejections come back as a failed log rather
    /// than an error.
    pub async fn send(&self, to: &str, text: &str) -> Result<SmsLog> {
        let (gateway, settings) = self.gateway().await?;
        self.send_with(gateway.as_ref(), &settings, to, text, None).await
    }

    /// Render a template for one recipient and send it
    pub async fn send_template(
        &self,
        template_id: &str,
        to: &str,
        vars: &HashMap<String, String>,
    ) -> Result<SmsLog> {
        let (gateway, settings) = self.gateway().await?;
        let template = self.template(template_id).await?;
        let text = render(&template.content, vars);
        self.send_with(gateway.as_ref(), &settings, to, &text, Some(template_id))
            .await
    }

    /// Send a template to many recipients. Failures are counted, not fatal.
    pub async fn send_bulk(&self, template_id: &str, recipients: &[Recipient]) -> Result<BulkReport> {
        let (gateway, settings) = self.gateway().await?;
        let template = self.template(template_id).await?;

        let mut report = BulkReport::default();
        for recipient in recipients {
            let text = render(&template.content, &recipient.vars);
            let log = match self
                .send_with(gateway.as_ref(), &settings, &recipient.mobile, &text, Some(template_id))
                .await
            {
                Ok(log) => log,
                // transport failure for this recipient; keep going
                Err(e) => {
                    let log = SmsLog {
                        to: recipient.mobile.clone(),
                        text,
                        template_id: Some(template_id.to_string()),
                        status: SmsSendStatus::Failed,
                        error: Some(e.to_string()),
                        ..Default::default()
                    };
                    self.record(log).await
                }
            };
            match log.status {
                SmsSendStatus::Sent => report.sent += 1,
                SmsSendStatus::Failed => report.failed += 1,
            }
            report.results.push(log);
        }

        info!(
            "Bulk SMS with {}: {} sent, {} failed",
            template_id, report.sent, report.failed
        );
        Ok(report)
    }

    async fn template(&self, template_id: &str) -> Result<SmsTemplate> {
        self.templates.ensure_loaded().await?;
        self.templates
            .get(template_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("SMS template {}", template_id)))
    }

    async fn send_with(
        &self,
        gateway: &dyn SmsGateway,
        settings: &SmsSettings,
        to: &str,
        text: &str,
        template_id: Option<&str>,
    ) -> Result<SmsLog> {
        let mobile = normalize_mobile(to);
        let result = if is_valid_mobile(&mobile) {
            gateway.send(&mobile, &settings.line_number, text).await?
        } else {
            SendResult::failed(format!("invalid mobile number '{}'", to))
        };

        let log = SmsLog {
            to: mobile,
            text: text.to_string(),
            template_id: template_id.map(|t| t.to_string()),
            status: if result.success {
                SmsSendStatus::Sent
            } else {
                SmsSendStatus::Failed
            },
            message_id: result.message_id,
            cost: result.cost,
            error: result.error,
            created_at: Some(Utc::now()),
            ..Default::default()
        };
        Ok(self.record(log).await)
    }

    /// Append the attempt to the log table. A failed log write does not undo
    /// a sent message.
    async fn record(&self, log: SmsLog) -> SmsLog {
        match self.logs.add(log.clone()).await {
            Ok(outcome) => outcome.value().unwrap_or(log),
            Err(e) => {
                warn!("Could not log SMS to {}: {}", log.to, e);
                log
            }
        }
    }
}
