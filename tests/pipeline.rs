//! End-to-end tests of the trait pipeline
//!
//! Each test builds an integration document (mostly from YAML, the way the
//! binary receives it), runs a full pass over the default catalog and checks
//! the resolved configuration and the generated resources.

use std::io::Write;
use std::sync::Arc;

use tempfile::NamedTempFile;

use kamel_traits::cluster::{Resource, ResourceKind, DIGEST_ANNOTATION, INTEGRATION_LABEL};
use kamel_traits::config::{
    apply_platform_defaults, load_document_file, parse_document, ConfigError, DecodeError,
    IntegrationDocument, Profile,
};
use kamel_traits::traits::{ApplyError, Catalog, ControllerStrategy, Environment};

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::default())
}

fn run(yaml: &str, options: &[&str]) -> Result<Environment, ApplyError> {
    let document = parse_document(yaml).expect("valid document");
    let options = options.iter().map(|o| o.to_string()).collect();
    catalog().apply(document, options)
}

fn env_value(env: &Environment, name: &str) -> Option<String> {
    let template = match env.resources.controller(&env.integration().name)? {
        Resource::Deployment(d) => &d.spec.template,
        Resource::CronJob(c) => &c.spec.template,
        Resource::KnativeService(k) => &k.spec.template,
        _ => return None,
    };
    template
        .env
        .iter()
        .find(|v| v.name == name)
        .map(|v| v.value.clone())
}

const LAYERED: &str = r#"
platform:
  traits:
    deployment:
      replicas: 1
    service:
      type: NodePort
kit:
  traits:
    deployment:
      replicas: 2
integration:
  name: shop
  sources: ["platform-http:/orders"]
  traits:
    deployment:
      replicas: 3
"#;

// ============================================================================
// Layer precedence and the annotation grammar
// ============================================================================

#[test]
fn test_instance_overrides_kit_and_platform() {
    let env = run(LAYERED, &[]).unwrap();
    let deployment = env.resources.deployment("shop").unwrap();
    assert_eq!(deployment.spec.replicas, Some(3));

    // Properties set only by a lower layer survive the merge
    let service = env.resources.service("shop").unwrap();
    assert_eq!(service.spec.service_type, "NodePort");
}

#[test]
fn test_annotations_override_instance() {
    let yaml = LAYERED.replace(
        "  name: shop\n",
        "  name: shop\n  annotations:\n    trait.camel.apache.org/deployment.replicas: \"4\"\n",
    );
    let env = run(&yaml, &[]).unwrap();
    assert_eq!(env.resources.deployment("shop").unwrap().spec.replicas, Some(4));

    // Command line options come after the document annotations
    let env = run(&yaml, &["deployment.replicas=5"]).unwrap();
    assert_eq!(env.resources.deployment("shop").unwrap().spec.replicas, Some(5));
}

#[test]
fn test_annotation_without_trait_id_is_rejected() {
    let yaml = r#"
platform: {}
integration:
  name: it
  annotations:
    trait.camel.apache.org/enabled: "true"
"#;
    let err = run(yaml, &[]).unwrap_err();
    assert!(matches!(
        err,
        ApplyError::Config(ConfigError::MalformedAnnotation(_))
    ));
}

#[test]
fn test_unknown_property_only_fails_in_annotations() {
    let from_spec = r#"
platform: {}
integration:
  name: it
  traits:
    service:
      colour: red
    no-such-trait:
      anything: 1
"#;
    assert!(run(from_spec, &[]).is_ok());

    let err = run(from_spec, &["service.colour=red"]).unwrap_err();
    assert!(matches!(
        err,
        ApplyError::Config(ConfigError::Decode(DecodeError::UnknownProperty { .. }))
    ));

    // Unknown trait ids are ignored in every layer
    assert!(run(from_spec, &["no-such-trait.anything=1"]).is_ok());
}

#[test]
fn test_weakly_typed_annotation_values_are_coerced() {
    let env = run(LAYERED, &["deployment.replicas=7", "service.enabled=true"]).unwrap();
    let props = env.properties("deployment");
    assert_eq!(props.int("replicas").unwrap(), Some(7));

    let err = run(LAYERED, &["deployment.replicas=many"]).unwrap_err();
    assert!(matches!(
        err,
        ApplyError::Config(ConfigError::Decode(DecodeError::InvalidValue { .. }))
    ));
}

#[test]
fn test_list_values_aggregate_within_a_layer() {
    let yaml = r#"
platform: {}
integration:
  name: it
  traits:
    owner:
      target-labels: ["from-instance"]
"#;
    let env = run(yaml, &["owner.target-labels=app", "owner.target-labels=team"]).unwrap();
    assert_eq!(
        env.properties("owner").string_list("target-labels").unwrap(),
        vec!["app", "team"]
    );

    let env = run(yaml, &[]).unwrap();
    assert_eq!(
        env.properties("owner").string_list("target-labels").unwrap(),
        vec!["from-instance"]
    );
}

#[test]
fn test_bracketed_paths_build_manual_triggers() {
    let yaml = r#"
platform: {}
integration:
  name: orders
  sources: ["kafka:orders?brokers=my-cluster:9092"]
  annotations:
    trait.camel.apache.org/keda.enabled: "true"
    trait.camel.apache.org/keda.triggers[0].type: cron
    trait.camel.apache.org/keda.triggers[0].metadata.start: "0 6 * * *"
"#;
    let env = run(yaml, &[]).unwrap();
    let scaled = env.resources.scaled_object("orders").unwrap();
    assert_eq!(scaled.spec.triggers.len(), 2);
    assert_eq!(scaled.spec.triggers[0].trigger_type, "cron");
    assert_eq!(scaled.spec.triggers[0].metadata["start"], "0 6 * * *");
    assert_eq!(scaled.spec.triggers[1].trigger_type, "kafka");

    let err = run(yaml, &["keda.triggers[2].type=kafka"]).unwrap_err();
    assert!(matches!(
        err,
        ApplyError::Config(ConfigError::Decode(DecodeError::InvalidPath { .. }))
    ));
}

#[test]
fn test_malformed_structured_values_fail_before_any_trait() {
    let yaml = r#"
platform: {}
integration:
  name: orders
  phase: running
  sources: ["kafka:orders"]
"#;
    let cases: &[&[&str]] = &[
        &["keda.auto-metadata.kafka=10"],
        &["keda.triggers[0]=oops"],
        &["keda.triggers[0].type=cron", "keda.triggers[0].metadata=x"],
        &["keda.enabled=true", "keda.auto-metadata.kafka=10"],
        &["keda.enabled=true", "keda.triggers[0]=oops"],
    ];
    for options in cases {
        let err = run(yaml, options).unwrap_err();
        assert!(
            matches!(err, ApplyError::Config(ConfigError::Decode(_))),
            "{:?} gave {}",
            options,
            err
        );
    }

    // A well-formed override on a disabled trait is accepted
    let env = run(yaml, &["keda.auto-metadata.kafka.lagThreshold=10"]).unwrap();
    assert!(env.resources.scaled_object("orders").is_none());
}

// ============================================================================
// Ordering and idempotence
// ============================================================================

#[test]
fn test_traits_run_in_catalog_order() {
    let yaml = r#"
platform: {}
integration:
  name: it
  sources: ["kafka:orders"]
"#;
    let env = run(yaml, &[]).unwrap();
    assert_eq!(
        env.executed_traits,
        vec!["camel", "deployer", "deployment", "owner"]
    );

    // One condition per trait allowed in the profile
    let ids: Vec<_> = env.conditions.iter().map(|c| c.trait_id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["camel", "deployer", "cron", "deployment", "service", "keda", "owner"]
    );
}

#[test]
fn test_repeated_passes_are_identical() {
    let first = run(LAYERED, &["keda.enabled=false"]).unwrap();
    let second = run(LAYERED, &["keda.enabled=false"]).unwrap();

    let a = serde_json::to_string(&first.resources.to_list()).unwrap();
    let b = serde_json::to_string(&second.resources.to_list()).unwrap();
    assert_eq!(a, b);
    assert_eq!(first.digest(), second.digest());
    assert_eq!(first.conditions, second.conditions);
}

#[test]
fn test_digest_tracks_configuration() {
    let a = run(LAYERED, &[]).unwrap();
    let b = run(LAYERED, &["deployment.replicas=9"]).unwrap();
    assert_ne!(a.digest(), b.digest());

    let deployment = a.resources.deployment("shop").unwrap();
    assert_eq!(deployment.metadata.annotations[DIGEST_ANNOTATION], a.digest());
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_periodic_integration_runs_as_cron_job() {
    let yaml = r#"
platform: {}
integration:
  name: ticker
  sources: ["timer:tick?period=60000", "log:info"]
"#;
    let env = run(yaml, &[]).unwrap();
    assert_eq!(env.controller_strategy(), Some(ControllerStrategy::CronJob));
    assert!(!env.resources.has_kind(ResourceKind::Deployment));
    assert!(!env.resources.has_kind(ResourceKind::Service));

    let job = env.resources.cron_job("ticker").unwrap();
    assert_eq!(job.spec.schedule, "0/1 * * * ?");
    assert_eq!(job.metadata.labels[INTEGRATION_LABEL], "ticker");
    assert_eq!(job.metadata.owner_references.len(), 1);
    assert_eq!(env_value(&env, "CAMEL_K_CRON_OVERRIDE").as_deref(), Some("timer"));
    assert!(env_value(&env, "CAMEL_K_RUNTIME_VERSION").is_some());
}

#[test]
fn test_forced_deployment_wins_over_schedule() {
    let yaml = r#"
platform: {}
integration:
  name: ticker
  sources: ["timer:tick?period=60000"]
"#;
    let env = run(yaml, &["deployer.kind=deployment"]).unwrap();
    assert_eq!(env.controller_strategy(), Some(ControllerStrategy::Deployment));
    assert!(env.resources.deployment("ticker").is_some());
    assert!(env.resources.cron_job("ticker").is_none());
}

#[test]
fn test_initialization_collects_dependencies() {
    let yaml = r#"
platform: {}
integration:
  name: ticker
  phase: initialization
  sources: ["timer:tick?period=60000"]
"#;
    let env = run(yaml, &[]).unwrap();
    assert!(env.resources.is_empty());
    assert_eq!(
        env.integration().dependencies,
        vec![
            "mvn:org.apache.camel.k/camel-k-runtime",
            "mvn:org.apache.camel.k/camel-k-runtime-cron",
        ]
    );
}

#[test]
fn test_kafka_consumer_scales_with_keda() {
    let yaml = r#"
platform: {}
integration:
  name: orders
  sources: ["kafka:orders?brokers=my-cluster:9092&groupId=shop"]
  traits:
    keda:
      enabled: true
      max-replica-count: 10
      auto-metadata:
        kafka:
          lagThreshold: 5
"#;
    let env = run(yaml, &[]).unwrap();
    assert!(env.resources.deployment("orders").is_some());
    assert!(env.resources.service("orders").is_none());

    let scaled = env.resources.scaled_object("orders").unwrap();
    assert_eq!(scaled.spec.scale_target_ref.kind, "Deployment");
    assert_eq!(scaled.spec.max_replica_count, Some(10));
    let trigger = &scaled.spec.triggers[0];
    assert_eq!(trigger.trigger_type, "kafka");
    assert_eq!(trigger.metadata["topic"], "orders");
    assert_eq!(trigger.metadata["bootstrapServers"], "my-cluster:9092");
    assert_eq!(trigger.metadata["consumerGroup"], "shop");
    assert_eq!(trigger.metadata["lagThreshold"], "5");
}

#[test]
fn test_http_integration_on_knative() {
    let yaml = r#"
platform:
  profile: knative
integration:
  name: hello
  sources: ["platform-http:/hello"]
"#;
    let env = run(yaml, &[]).unwrap();
    assert_eq!(env.determine_profile(), Profile::Knative);
    assert_eq!(
        env.controller_strategy(),
        Some(ControllerStrategy::KnativeService)
    );
    assert_eq!(env.resources.len(), 1);

    let ksvc = env.resources.knative_service("hello").unwrap();
    assert!(!ksvc
        .spec
        .template
        .annotations
        .contains_key("autoscaling.knative.dev/minScale"));
    assert!(env.conditions.iter().all(|c| c.trait_id != "service"));
}

#[test]
fn test_http_integration_on_kubernetes_gets_service() {
    let env = run(LAYERED, &["service.ports=http;80;8080", "service.ports=admin;9000;9000"]).unwrap();
    let service = env.resources.service("shop").unwrap();
    assert_eq!(service.spec.ports.len(), 2);
    assert_eq!(service.spec.selector[INTEGRATION_LABEL], "shop");
}

#[test]
fn test_missing_platform_yields_no_applicable_trait() {
    let yaml = r#"
integration:
  name: it
  sources: ["timer:tick"]
"#;
    assert!(matches!(
        run(yaml, &[]),
        Err(ApplyError::NoApplicableTrait)
    ));
}

#[test]
fn test_failing_trait_aborts_the_pass() {
    let err = run(LAYERED, &["service.type=ExternalName"]).unwrap_err();
    assert!(matches!(err, ApplyError::Apply { id: "service", .. }));
}

// ============================================================================
// Document loading
// ============================================================================

fn temp_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_platform_defaults_from_file() {
    let document_file = temp_file(
        r#"{"integration": {"name": "hello", "sources": ["platform-http:/hello"]}}"#,
    );
    let platform_file = temp_file("profile: knative\nruntimeVersion: 9.9.9\n");

    let mut document: IntegrationDocument = load_document_file(document_file.path()).unwrap();
    assert!(document.platform.is_none());
    apply_platform_defaults(&mut document, Some(platform_file.path())).unwrap();

    let env = catalog().apply(document, Vec::new()).unwrap();
    assert!(env.resources.knative_service("hello").is_some());
    assert_eq!(env.runtime_version.as_deref(), Some("9.9.9"));
}

#[test]
fn test_concurrent_passes_share_the_catalog() {
    let catalog = catalog();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let catalog = Arc::clone(&catalog);
            std::thread::spawn(move || {
                let yaml = format!(
                    "platform: {{}}\nintegration:\n  name: it-{}\n  sources: [\"kafka:t{}\"]\n",
                    i, i
                );
                let document = parse_document(&yaml).unwrap();
                catalog.apply(document, Vec::new()).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let env = handle.join().unwrap();
        assert!(env.resources.deployment(&format!("it-{}", i)).is_some());
    }
}
