//! Indicator-lookup fan-out (C5): searches the vendor for each entity value
//! in parallel, drops private-IP literals before dispatch, and aggregates
//! the results into the store and a summary response.

use crate::filters::TypeFilter;
use crate::store::AlertStore;
use crate::vendor::parallel::parallel_requests;
use crate::vendor::VendorClient;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::sync::Arc;
use utoipa::ToSchema;

/// Private ranges per RFC1918: `10/8`, `172.16/12`, `192.168/16`.
pub fn is_private_ipv4(value: &str) -> bool {
    match value.parse::<Ipv4Addr>() {
        Ok(ip) => {
            let octets = ip.octets();
            octets[0] == 10
                || (octets[0] == 172 && (16..=31).contains(&octets[1]))
                || (octets[0] == 192 && octets[1] == 168)
        }
        Err(_) => false,
    }
}

const MAX_PAGE_SIZE: usize = 10;

/// One entity to search for. `is_ip` gates the private-IP filter — only
/// entities explicitly typed as IPs are checked against RFC1918 ranges, so a
/// non-IP value that happens to parse as one (a hash, say) is never dropped.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LookupEntity {
    pub value: String,
    #[serde(default, rename = "isIP")]
    pub is_ip: bool,
    #[serde(default)]
    pub types: Vec<String>,
}

/// The result for one entity: a summary line plus the alerts that matched,
/// or `None` if the entity's search failed outright.
pub struct EntityLookup {
    pub entity: String,
    pub data: Option<(Vec<String>, Vec<crate::vendor::types::Alert>)>,
}

/// Runs the indicator lookup for `entities`: drops private IPs, searches
/// the remainder in parallel, admits hits into `store` under the configured
/// type filter, and assembles a per-entity `summary`/`alerts` result. In
/// trial mode, alert bodies are suppressed but counts are preserved.
pub async fn lookup_indicators(
    vendor: &Arc<VendorClient>,
    store: &Arc<AlertStore>,
    filter: &TypeFilter,
    entities: Vec<LookupEntity>,
    trial_mode: bool,
) -> Vec<EntityLookup> {
    let candidates = filter_candidates(entities);

    let vendor = Arc::clone(vendor);
    let tagged = parallel_requests(candidates, move |value| {
        let vendor = Arc::clone(&vendor);
        async move { vendor.search_alerts(&value, MAX_PAGE_SIZE as u32).await }
    })
    .await;

    let now_ms = chrono::Utc::now().timestamp_millis();
    let mut results = Vec::new();

    for tagged_result in tagged {
        let Some(found) = tagged_result.result else {
            results.push(EntityLookup { entity: tagged_result.key, data: None });
            continue;
        };
        if found.is_empty() {
            results.push(EntityLookup { entity: tagged_result.key, data: None });
            continue;
        }
        let n = found.len();
        for alert in &found {
            store.add(alert.clone(), &|t| filter.matches(t), now_ms);
        }
        let suffix = if n >= MAX_PAGE_SIZE { "+" } else { "" };
        let summary = vec![format!("Alerts: {n}{suffix}")];
        let alerts = if trial_mode { Vec::new() } else { found };
        results.push(EntityLookup { entity: tagged_result.key, data: Some((summary, alerts)) });
    }

    results
}

/// Drops entities explicitly typed as IPs whose value falls in a private
/// RFC1918 range. Entities not typed as IPs pass through untouched, even if
/// their value happens to parse as one.
fn filter_candidates(entities: Vec<LookupEntity>) -> Vec<String> {
    entities
        .into_iter()
        .filter(|e| {
            if e.is_ip && is_private_ipv4(&e.value) {
                log::debug!("dropping private IP literal '{}' from indicator lookup", e.value);
                false
            } else {
                true
            }
        })
        .map(|e| e.value)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_ip_entities_are_dropped_when_flagged() {
        let entities = vec![
            LookupEntity { value: "10.0.0.1".to_string(), is_ip: true, types: vec![] },
            LookupEntity { value: "8.8.8.8".to_string(), is_ip: true, types: vec![] },
        ];
        assert_eq!(filter_candidates(entities), vec!["8.8.8.8".to_string()]);
    }

    #[test]
    fn non_ip_entities_bypass_the_private_ip_filter() {
        let entities = vec![LookupEntity { value: "10.0.0.1".to_string(), is_ip: false, types: vec![] }];
        assert_eq!(filter_candidates(entities), vec!["10.0.0.1".to_string()]);
    }

    #[test]
    fn private_ipv4_ranges_are_detected() {
        assert!(is_private_ipv4("10.0.0.1"));
        assert!(is_private_ipv4("172.16.5.5"));
        assert!(is_private_ipv4("172.31.0.1"));
        assert!(is_private_ipv4("192.168.1.1"));
    }

    #[test]
    fn public_and_non_ip_values_are_not_private() {
        assert!(!is_private_ipv4("8.8.8.8"));
        assert!(!is_private_ipv4("172.32.0.1"));
        assert!(!is_private_ipv4("not-an-ip"));
    }
}
