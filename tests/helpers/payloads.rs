#![allow(dead_code)]
//! Alertmanager webhook bodies used across the integration tests.

/// Builds an Alertmanager webhook body with one firing alert per entry of
/// `alerts`, given as `(alertname, level)`.
pub fn alertmanager_payload(alerts: &[(&str, &str)]) -> String {
    let alerts: Vec<serde_json::Value> = alerts
        .iter()
        .map(|(name, level)| {
            serde_json::json!({
                "status": "firing",
                "labels": {
                    "alertname": name,
                    "level": level,
                    "hostname": "web-01",
                    "env": "prod",
                    "job": "node",
                    "project": "shop",
                    "service": "api"
                },
                "annotations": { "summary": "something is wrong" },
                "startsAt": "2024-03-05T10:20:30.000+08:00",
                "endsAt": "0001-01-01T00:00:00Z"
            })
        })
        .collect();

    serde_json::json!({
        "receiver": "wechat",
        "status": "firing",
        "alerts": alerts,
        "groupLabels": {},
        "commonLabels": {},
        "externalURL": "http://alertmanager:9093",
        "version": "4"
    })
    .to_string()
}
