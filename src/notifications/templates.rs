//! Message templates
//!
//! Templates are plain text with `{tail}`, `{distance}`, `{altitude}`, `{eta}` and `{time}`
//! placeholders. Unknown placeholders are left as written.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::warn;

use crate::airspace::QuietHours;
use crate::events::{EventKind, NotificationEvent};
use crate::tenant::AlertSetting;

pub const LANDING_TEMPLATE: &str = "**🛬 {tail} LANDING**\nTime: {time}\n✅ Ready to put away";

pub const TEST_MESSAGE_TEMPLATE: &str = "🧪 **Test Notification**\nYour {channel} integration is working! ✅";

/// Built-in template for an event kind
pub fn default_template(kind: EventKind) -> String {
    match kind {
        EventKind::Distance(key) => {
            format!("**{{tail}} - {} out**\nETA ~{{eta}}min, Alt {{altitude}}ft AGL", key)
        }
        EventKind::Landing => LANDING_TEMPLATE.to_string(),
    }
}

/// How a tenant wants a kind of event handled
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateChoice {
    Render(String),
    Disabled,
}

/// A tenant's per-kind template overrides
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    overrides: HashMap<EventKind, AlertSetting>,
}

impl TemplateSet {
    pub fn from_settings(settings: &[AlertSetting]) -> Self {
        let mut overrides = HashMap::new();
        for setting in settings {
            match setting.event_kind() {
                Ok(kind) => {
                    overrides.insert(kind, setting.clone());
                }
                Err(e) => warn!(kind = %setting.kind, error = %e, "Ignoring alert setting"),
            }
        }
        Self { overrides }
    }

    /// Resolve the template for an event kind: an enabled override wins, a disabled one
    /// suppresses the kind, otherwise the built-in default applies
    pub fn resolve(&self, kind: EventKind) -> TemplateChoice {
        match self.overrides.get(&kind) {
            Some(setting) if !setting.enabled => TemplateChoice::Disabled,
            Some(setting) if !setting.message_template.trim().is_empty() => {
                TemplateChoice::Render(setting.message_template.clone())
            }
            _ => TemplateChoice::Render(default_template(kind)),
        }
    }
}

/// Substitute event fields into a template
///
/// Distance renders with one decimal, altitude as whole feet (0 when unknown) and ETA as
/// minutes or `N/A`. Time is the event time on the tenant's clock as `HH:MM`.
pub fn render(template: &str, event: &NotificationEvent, clock: &QuietHours) -> String {
    let eta = event
        .eta_minutes
        .map(|m| m.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    template
        .replace("{tail}", &event.label)
        .replace("{distance}", &format!("{:.1}", event.distance_nm))
        .replace("{altitude}", &format!("{:.0}", event.altitude_agl_ft.unwrap_or(0.0)))
        .replace("{eta}", &eta)
        .replace("{time}", &local_hhmm(event.timestamp, clock))
}

pub fn render_test_message(channel: &str) -> String {
    TEST_MESSAGE_TEMPLATE.replace("{channel}", channel)
}

fn local_hhmm(at: DateTime<Utc>, clock: &QuietHours) -> String {
    clock.local_time(at).format("%H:%M").to_string()
}
