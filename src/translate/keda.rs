//! Mapping of consumer endpoints to KEDA scaler triggers
//!
//! Each supported scheme has a scaler type, an optional metadata key receiving
//! the URI path, and a table renaming Camel query parameters to scaler
//! metadata keys. Parameters outside the table are not forwarded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::uri::{EndpointUri, UriError};

/// A KEDA trigger: scaler type plus its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KedaTrigger {
    #[serde(rename = "type")]
    pub trigger_type: String,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl KedaTrigger {
    pub fn new(trigger_type: impl Into<String>) -> Self {
        Self {
            trigger_type: trigger_type.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

struct ScalerMapping {
    scheme: &'static str,
    trigger_type: &'static str,
    path_parameter: Option<&'static str>,
    parameters: &'static [(&'static str, &'static str)],
}

static SCALER_MAPPINGS: &[ScalerMapping] = &[
    ScalerMapping {
        scheme: "kafka",
        trigger_type: "kafka",
        path_parameter: Some("topic"),
        parameters: &[
            ("brokers", "bootstrapServers"),
            ("groupId", "consumerGroup"),
        ],
    },
    ScalerMapping {
        scheme: "aws2-sqs",
        trigger_type: "aws-sqs-queue",
        path_parameter: Some("queueURL"),
        parameters: &[("region", "awsRegion")],
    },
    ScalerMapping {
        scheme: "aws2-kinesis",
        trigger_type: "aws-kinesis-stream",
        path_parameter: Some("streamName"),
        parameters: &[("region", "awsRegion")],
    },
    ScalerMapping {
        scheme: "spring-rabbitmq",
        trigger_type: "rabbitmq",
        path_parameter: None,
        parameters: &[("queues", "queueName"), ("addresses", "host")],
    },
];

fn mapping_for(scheme: &str) -> Option<&'static ScalerMapping> {
    SCALER_MAPPINGS.iter().find(|m| m.scheme == scheme)
}

/// Trigger for a single endpoint, `None` when the scheme has no scaler
pub fn map_trigger(uri: &str) -> Result<Option<KedaTrigger>, UriError> {
    map_trigger_with_overrides(uri, None)
}

/// Same as [`map_trigger`], with `overrides` layered on top of the
/// discovered metadata (override wins per key)
pub fn map_trigger_with_overrides(
    uri: &str,
    overrides: Option<&BTreeMap<String, String>>,
) -> Result<Option<KedaTrigger>, UriError> {
    let parsed = EndpointUri::parse(uri)?;
    let Some(mapping) = mapping_for(&parsed.scheme) else {
        return Ok(None);
    };

    let mut trigger = KedaTrigger::new(mapping.trigger_type);
    if let Some(key) = mapping.path_parameter {
        if !parsed.path.is_empty() {
            trigger.metadata.insert(key.to_string(), parsed.path.clone());
        }
    }
    for (param, value) in &parsed.params {
        if let Some((_, renamed)) = mapping.parameters.iter().find(|(p, _)| p == param) {
            trigger.metadata.insert(renamed.to_string(), value.clone());
        }
    }
    if let Some(overrides) = overrides {
        for (k, v) in overrides {
            trigger.metadata.insert(k.clone(), v.clone());
        }
    }
    Ok(Some(trigger))
}

/// Triggers for all endpoints, in endpoint order. `overrides` is keyed by
/// scheme.
pub fn discover_triggers<S: AsRef<str>>(
    uris: &[S],
    overrides: &BTreeMap<String, BTreeMap<String, String>>,
) -> Result<Vec<KedaTrigger>, UriError> {
    let mut triggers = Vec::new();
    for uri in uris {
        let uri = uri.as_ref();
        let scheme = super::uri::component(uri);
        if let Some(trigger) = map_trigger_with_overrides(uri, overrides.get(scheme))? {
            triggers.push(trigger);
        }
    }
    Ok(triggers)
}

/// Manual triggers first, then discovered ones. Nothing is de-duplicated.
pub fn combine_triggers(manual: Vec<KedaTrigger>, discovered: Vec<KedaTrigger>) -> Vec<KedaTrigger> {
    let mut all = manual;
    all.extend(discovered);
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kafka_trigger() {
        let trigger = map_trigger("kafka:orders?brokers=b:9092&groupId=g1")
            .unwrap()
            .unwrap();
        assert_eq!(
            trigger,
            KedaTrigger::new("kafka")
                .with_metadata("topic", "orders")
                .with_metadata("bootstrapServers", "b:9092")
                .with_metadata("consumerGroup", "g1")
        );
    }

    #[test]
    fn test_unmapped_scheme() {
        assert_eq!(map_trigger("timer:tick").unwrap(), None);
    }

    #[test]
    fn test_unknown_parameters_dropped() {
        let trigger = map_trigger("kafka:orders?autoOffsetReset=earliest")
            .unwrap()
            .unwrap();
        assert_eq!(trigger.metadata.len(), 1);
        assert_eq!(trigger.metadata["topic"], "orders");
    }

    #[test]
    fn test_scheme_without_path_parameter() {
        let trigger = map_trigger("spring-rabbitmq:exchange?queues=jobs")
            .unwrap()
            .unwrap();
        assert_eq!(trigger.trigger_type, "rabbitmq");
        assert_eq!(trigger.metadata.get("queueName").map(String::as_str), Some("jobs"));
        assert!(!trigger.metadata.values().any(|v| v == "exchange"));
    }

    #[test]
    fn test_overrides_win() {
        let mut overrides = BTreeMap::new();
        overrides.insert("topic".to_string(), "other".to_string());
        overrides.insert("lagThreshold".to_string(), "10".to_string());
        let trigger = map_trigger_with_overrides("kafka:orders", Some(&overrides))
            .unwrap()
            .unwrap();
        assert_eq!(trigger.metadata["topic"], "other");
        assert_eq!(trigger.metadata["lagThreshold"], "10");
    }

    #[test]
    fn test_malformed_query_fails() {
        assert!(map_trigger("kafka:orders?brokers=%G1").is_err());
    }

    #[test]
    fn test_trigger_rejects_unknown_fields() {
        let err = serde_json::from_value::<KedaTrigger>(serde_json::json!({
            "type": "kafka",
            "authenticationSecret": "creds"
        }));
        assert!(err.is_err());
        let ok: KedaTrigger = serde_json::from_value(serde_json::json!({"type": "cron"})).unwrap();
        assert!(ok.metadata.is_empty());
    }

    #[test]
    fn test_discover_and_combine() {
        let uris = ["timer:tick", "kafka:a", "kafka:a"];
        let discovered = discover_triggers(&uris, &BTreeMap::new()).unwrap();
        assert_eq!(discovered.len(), 2);

        let manual = vec![KedaTrigger::new("cron")];
        let all = combine_triggers(manual, discovered);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].trigger_type, "cron");
        assert_eq!(all[1], all[2]);
    }
}
