//! The request dispatcher (C4): routes the five known actions, composing
//! the store and vendor gateway, and assembling typed responses. Shaped
//! after the teacher's `api/handlers.rs` request/response/error pattern and
//! `latest/handler.rs`'s resolve-then-delegate composite orchestration.

use crate::error::{DispatchError, VendorError};
use crate::filters::TypeFilterFactory;
use crate::lookup::{lookup_indicators, LookupEntity};
use crate::renderer::AlertRenderer;
use crate::store::AlertStore;
use crate::vendor::types::Alert;
use crate::vendor::VendorClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum DispatchAction {
    Lookup {
        entities: Vec<LookupEntity>,
    },
    GetAlerts {
        #[serde(default)]
        since_timestamp: Option<i64>,
        #[serde(default)]
        count: Option<usize>,
    },
    GetAlertById {
        alert_id: String,
    },
    RenderAlertDetail {
        alert_id: String,
        #[serde(default)]
        timezone: Option<String>,
    },
    RenderAlertNotification {
        name: String,
    },
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum DispatchResponse {
    Lookup { results: Vec<LookupEntityResult> },
    GetAlerts { alerts: Vec<Alert>, count: usize, last_alert_timestamp: Option<i64> },
    GetAlertById { alert: Option<Alert>, #[serde(skip_serializing_if = "Option::is_none")] message: Option<String> },
    Html { html: String },
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LookupEntityResult {
    pub entity: String,
    pub data: Option<LookupEntityData>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LookupEntityData {
    pub summary: Vec<String>,
    pub details: LookupEntityDetails,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LookupEntityDetails {
    pub alerts: Vec<Alert>,
    pub alert_count: usize,
}

pub struct Dispatcher {
    pub vendor: Arc<VendorClient>,
    pub store: Arc<AlertStore>,
    pub filters: Arc<TypeFilterFactory>,
    pub renderer: Arc<dyn AlertRenderer>,
    pub watched_types: Vec<String>,
    pub watched_lists: Vec<String>,
    /// Process-wide trial-mode flag (configured at startup, not per-request):
    /// suppresses alert bodies in lookup responses while preserving counts.
    pub trial_mode: bool,
}

impl Dispatcher {
    pub async fn dispatch(&self, action: DispatchAction) -> Result<DispatchResponse, DispatchError> {
        match action {
            DispatchAction::Lookup { entities } => self.handle_lookup(entities).await,
            DispatchAction::GetAlerts { since_timestamp, count } => self.handle_get_alerts(since_timestamp, count).await,
            DispatchAction::GetAlertById { alert_id } => self.handle_get_alert_by_id(&alert_id).await,
            DispatchAction::RenderAlertDetail { alert_id, timezone } => {
                self.handle_render_detail(&alert_id, timezone).await
            }
            DispatchAction::RenderAlertNotification { name } => self.handle_render_notification(&name),
        }
    }

    async fn handle_lookup(&self, entities: Vec<LookupEntity>) -> Result<DispatchResponse, DispatchError> {
        let filter = self.filters.get(&self.watched_types);
        let lookups = lookup_indicators(&self.vendor, &self.store, &filter, entities, self.trial_mode).await;

        let results = lookups
            .into_iter()
            .map(|lookup| {
                let data = lookup.data.map(|(summary, alerts)| {
                    let alert_count = alerts.len();
                    LookupEntityData { summary, details: LookupEntityDetails { alerts, alert_count } }
                });
                LookupEntityResult { entity: lookup.entity, data }
            })
            .collect();

        Ok(DispatchResponse::Lookup { results })
    }

    async fn handle_get_alerts(
        &self,
        since_timestamp: Option<i64>,
        count: Option<usize>,
    ) -> Result<DispatchResponse, DispatchError> {
        let mut alerts = if count.is_some() {
            self.store.get_all(None)
        } else {
            self.store.get_all(since_timestamp)
        };

        if !self.watched_lists.is_empty() {
            alerts.retain(|a| a.matches_list(&self.watched_lists));
        }
        let read_filter = self.filters.get(&self.watched_types);
        alerts.retain(|a| read_filter.matches(&a.type_lower()));

        if let Some(wanted) = count {
            if alerts.len() < wanted {
                let page_size = wanted as u32;
                match self.vendor.fetch_alerts_page(None, page_size).await {
                    Ok(page) => {
                        let now_ms = chrono::Utc::now().timestamp_millis();
                        for alert in page.alerts {
                            self.store.add(alert, &|t| read_filter.matches(t), now_ms);
                        }
                        alerts = self.store.get_all(None);
                        if !self.watched_lists.is_empty() {
                            alerts.retain(|a| a.matches_list(&self.watched_lists));
                        }
                        alerts.retain(|a| read_filter.matches(&a.type_lower()));
                    }
                    Err(e) => {
                        log::warn!("getAlerts count fallback fetch failed: {e}");
                    }
                }
            }
            alerts.truncate(wanted);
        }

        let last_alert_timestamp = alerts.first().map(|a| a.alert_timestamp);
        let count = alerts.len();
        Ok(DispatchResponse::GetAlerts { alerts, count, last_alert_timestamp })
    }

    async fn resolve_alert(&self, alert_id: &str) -> Result<Option<Alert>, DispatchError> {
        if let Some(hit) = self.store.get_by_id(alert_id) {
            return Ok(Some(hit));
        }
        match self.vendor.fetch_alert_by_id(alert_id, &self.watched_lists).await {
            Ok(found) => Ok(found),
            Err(VendorError::UpstreamStatus { status: 404, .. }) => Ok(None),
            Err(e) => Err(DispatchError::Vendor(e)),
        }
    }

    async fn handle_get_alert_by_id(&self, alert_id: &str) -> Result<DispatchResponse, DispatchError> {
        if alert_id.is_empty() {
            return Err(DispatchError::BadRequest("alertId must not be empty".to_string()));
        }
        match self.resolve_alert(alert_id).await? {
            Some(alert) => Ok(DispatchResponse::GetAlertById { alert: Some(alert), message: None }),
            None => Ok(DispatchResponse::GetAlertById {
                alert: None,
                message: Some("Alert not found".to_string()),
            }),
        }
    }

    async fn handle_render_detail(
        &self,
        alert_id: &str,
        _timezone: Option<String>,
    ) -> Result<DispatchResponse, DispatchError> {
        match self.resolve_alert(alert_id).await? {
            Some(alert) => Ok(DispatchResponse::Html { html: self.renderer.render_detail(&alert) }),
            None => Ok(DispatchResponse::Html { html: String::new() }),
        }
    }

    fn handle_render_notification(&self, name: &str) -> Result<DispatchResponse, DispatchError> {
        let placeholder = Alert {
            alert_id: String::new(),
            alert_timestamp: 0,
            alert_type: crate::vendor::types::AlertType { name: String::new() },
            headline: name.to_string(),
            lists_matched: None,
            extra: std::collections::HashMap::new(),
        };
        Ok(DispatchResponse::Html { html: self.renderer.render_notification(&placeholder) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::FallbackRenderer;

    fn dispatcher() -> Dispatcher {
        Dispatcher {
            vendor: Arc::new(VendorClient::new("https://vendor.example".into(), "id".into(), "secret".into())),
            store: Arc::new(AlertStore::with_defaults()),
            filters: Arc::new(TypeFilterFactory::new()),
            renderer: Arc::new(FallbackRenderer),
            watched_types: vec!["flash".to_string()],
            watched_lists: Vec::new(),
            trial_mode: false,
        }
    }

    #[tokio::test]
    async fn get_alert_by_id_rejects_empty_id() {
        let d = dispatcher();
        let result = d.dispatch(DispatchAction::GetAlertById { alert_id: String::new() }).await;
        assert!(matches!(result, Err(DispatchError::BadRequest(_))));
    }

    #[tokio::test]
    async fn render_notification_is_pure() {
        let d = dispatcher();
        let result = d
            .dispatch(DispatchAction::RenderAlertNotification { name: "hello".to_string() })
            .await
            .unwrap();
        match result {
            DispatchResponse::Html { html } => assert!(html.contains("hello")),
            _ => panic!("expected Html response"),
        }
    }

    #[tokio::test]
    async fn get_alerts_returns_empty_store_as_zero_count() {
        let d = dispatcher();
        let result = d.dispatch(DispatchAction::GetAlerts { since_timestamp: None, count: None }).await.unwrap();
        match result {
            DispatchResponse::GetAlerts { count, last_alert_timestamp, .. } => {
                assert_eq!(count, 0);
                assert_eq!(last_alert_timestamp, None);
            }
            _ => panic!("expected GetAlerts response"),
        }
    }

    #[test]
    fn action_deserializes_by_tag() {
        let action: DispatchAction = serde_json::from_str(r#"{"action":"getAlertById","alertId":"A1"}"#).unwrap();
        assert!(matches!(action, DispatchAction::GetAlertById { alert_id } if alert_id == "A1"));
    }

    #[tokio::test]
    async fn get_alerts_applies_configured_list_filter_at_read_time() {
        let mut d = dispatcher();
        d.watched_lists = vec!["9".to_string()];

        let matching = Alert {
            alert_id: "A".to_string(),
            alert_timestamp: 100,
            alert_type: crate::vendor::types::AlertType { name: "flash".to_string() },
            headline: "h".to_string(),
            lists_matched: Some(vec![crate::vendor::types::ListEntry { id: "9".to_string(), name: "n".to_string() }]),
            extra: std::collections::HashMap::new(),
        };
        let non_matching = Alert {
            alert_id: "B".to_string(),
            alert_timestamp: 200,
            alert_type: crate::vendor::types::AlertType { name: "flash".to_string() },
            headline: "h".to_string(),
            lists_matched: Some(vec![crate::vendor::types::ListEntry { id: "1".to_string(), name: "n".to_string() }]),
            extra: std::collections::HashMap::new(),
        };
        d.store.add(matching, &|_| true, 1_000_000);
        d.store.add(non_matching, &|_| true, 1_000_000);

        let result = d.dispatch(DispatchAction::GetAlerts { since_timestamp: None, count: None }).await.unwrap();
        match result {
            DispatchResponse::GetAlerts { alerts, count, .. } => {
                assert_eq!(count, 1);
                assert_eq!(alerts[0].alert_id, "A");
            }
            _ => panic!("expected GetAlerts response"),
        }
    }
}
