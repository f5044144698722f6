// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Gated outbound messaging.
//!
//! Every bulk send in the system goes through [`DispatchGate::send_with_check`],
//! which consults a feature-flag source before touching the provider. Flip
//! one flag and a whole category of sends stops, without touching call
//! sites. Admin-triggered one-offs use [`DispatchGate::send_direct`].
//!
//! The gate never throws delivery problems at its callers: provider errors,
//! network failures, and disabled flags all normalize into a
//! [`SendOutcome`]. Registering a member must not fail because an AlimTalk
//! endpoint had a bad minute.

use crate::error::SendError;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Provider accepted-code convention: `0` means queued for delivery.
const PROVIDER_OK: i64 = 0;

/// HTTP sender timeout.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Gated message categories.
///
/// Keys match the control-center JSON blob verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    VisitReminder,
    Payment,
    Registration,
}

impl Feature {
    pub fn key(&self) -> &'static str {
        match self {
            Feature::VisitReminder => "VISIT_REMINDER",
            Feature::Payment => "PAYMENT",
            Feature::Registration => "REGISTRATION",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Where the gate reads its on/off switches.
///
/// Injected, not global: each deployment decides whether flags come from a
/// config file, a DB row, or a test fixture.
pub trait FlagSource: Send + Sync {
    fn is_enabled(&self, feature: Feature) -> bool;
}

/// Flag source over a single JSON object keyed by feature name, e.g.
/// `{"VISIT_REMINDER": false, "PAYMENT": true}`.
///
/// A key absent from the blob counts as enabled — suppression is always an
/// explicit operator action. Reload replaces the whole map at once.
pub struct JsonFlags {
    flags: RwLock<HashMap<String, bool>>,
}

impl JsonFlags {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let flags: HashMap<String, bool> = serde_json::from_str(json)?;
        Ok(Self {
            flags: RwLock::new(flags),
        })
    }

    /// Everything enabled; the state of a deployment with no control-center
    /// row yet.
    pub fn all_enabled() -> Self {
        Self {
            flags: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces the flag map from a fresh JSON blob.
    pub fn reload(&self, json: &str) -> Result<(), serde_json::Error> {
        let flags: HashMap<String, bool> = serde_json::from_str(json)?;
        *self.flags.write() = flags;
        Ok(())
    }
}

impl FlagSource for JsonFlags {
    fn is_enabled(&self, feature: Feature) -> bool {
        self.flags
            .read()
            .get(feature.key())
            .copied()
            .unwrap_or(true)
    }
}

/// An outbound AlimTalk/SMS payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Provider template identifier, when the channel requires one.
    pub template_code: Option<String>,
    /// Fully rendered message body.
    pub body: String,
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            template_code: None,
            body: body.into(),
        }
    }

    pub fn templated(template_code: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            template_code: Some(template_code.into()),
            body: body.into(),
        }
    }
}

/// Substitutes `#{name}`-style variables into a message template.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut rendered = template.to_string();
    for (name, value) in vars {
        rendered = rendered.replace(&format!("#{{{name}}}"), value);
    }
    rendered
}

/// Provider-level reply to a send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderReply {
    pub code: i64,
    pub message: String,
}

/// Push delivery summary across a token batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub failure_count: usize,
    pub results: Vec<ProviderReply>,
}

/// Normalized result every gate call returns.
///
/// `success == false` covers both "skipped by flag" and "provider failed";
/// the message says which. Callers log it and move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub success: bool,
    pub message: Option<String>,
}

impl SendOutcome {
    fn sent() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    fn skipped(feature: Feature) -> Self {
        Self {
            success: false,
            message: Some(format!("feature disabled: {feature}")),
        }
    }

    fn failed(detail: String) -> Self {
        Self {
            success: false,
            message: Some(detail),
        }
    }
}

/// Message delivery collaborator (AlimTalk/SMS).
pub trait MessageSender: Send + Sync {
    fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<ProviderReply, SendError>;
}

/// Push delivery collaborator.
pub trait PushSender: Send + Sync {
    fn send(&self, tokens: &[String], title: &str, body: &str) -> Result<PushReport, SendError>;
}

/// The flag-checked front door for all outbound messaging.
pub struct DispatchGate {
    flags: Arc<dyn FlagSource>,
    sender: Arc<dyn MessageSender>,
    push: Option<Arc<dyn PushSender>>,
}

impl DispatchGate {
    pub fn new(flags: Arc<dyn FlagSource>, sender: Arc<dyn MessageSender>) -> Self {
        Self {
            flags,
            sender,
            push: None,
        }
    }

    pub fn with_push(mut self, push: Arc<dyn PushSender>) -> Self {
        self.push = Some(push);
        self
    }

    /// Sends if the feature's flag allows it; otherwise skips silently.
    ///
    /// A skip is not an error — the outcome says so and the provider is
    /// never contacted.
    pub fn send_with_check(
        &self,
        feature: Feature,
        recipient: &str,
        message: &OutboundMessage,
    ) -> SendOutcome {
        if !self.flags.is_enabled(feature) {
            debug!(%feature, "send suppressed by flag");
            return SendOutcome::skipped(feature);
        }
        self.dispatch(recipient, message)
    }

    /// Bypasses the flag for explicit admin-triggered sends.
    pub fn send_direct(&self, recipient: &str, message: &OutboundMessage) -> SendOutcome {
        self.dispatch(recipient, message)
    }

    /// Push delivery to a token batch, normalized like everything else.
    pub fn send_push(&self, tokens: &[String], title: &str, body: &str) -> SendOutcome {
        let Some(push) = &self.push else {
            return SendOutcome::failed("no push sender configured".to_string());
        };
        if tokens.is_empty() {
            return SendOutcome::failed("no push tokens".to_string());
        }
        match push.send(tokens, title, body) {
            Ok(report) if report.failure_count == 0 => SendOutcome::sent(),
            Ok(report) => {
                warn!(failures = report.failure_count, "partial push failure");
                SendOutcome::failed(format!(
                    "{} of {} push sends failed",
                    report.failure_count,
                    tokens.len()
                ))
            }
            Err(e) => {
                warn!(error = %e, "push send failed");
                SendOutcome::failed(e.to_string())
            }
        }
    }

    fn dispatch(&self, recipient: &str, message: &OutboundMessage) -> SendOutcome {
        match self.sender.send(recipient, message) {
            Ok(reply) if reply.code == PROVIDER_OK => SendOutcome::sent(),
            Ok(reply) => {
                warn!(code = reply.code, reply = %reply.message, "provider rejected send");
                SendOutcome::failed(format!("provider code {}: {}", reply.code, reply.message))
            }
            Err(e) => {
                warn!(error = %e, "send failed");
                SendOutcome::failed(e.to_string())
            }
        }
    }
}

/// HTTP message sender posting JSON to a provider-relay endpoint.
///
/// Blocking client with a hard timeout; a hung provider surfaces as
/// [`SendError::Timeout`], not a stuck caller.
pub struct HttpSender {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl HttpSender {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, SendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| SendError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

impl MessageSender for HttpSender {
    fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<ProviderReply, SendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "recipient": recipient,
                "template_code": message.template_code,
                "message": message.body,
            }))
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    SendError::Timeout
                } else {
                    SendError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Provider {
                code: status.as_u16() as i64,
                message: format!("http status {status}"),
            });
        }

        let reply: ProviderReply = response
            .json()
            .map_err(|e| SendError::Network(e.to_string()))?;
        if reply.code != PROVIDER_OK {
            return Err(SendError::Provider {
                code: reply.code,
                message: reply.message,
            });
        }
        Ok(reply)
    }
}
