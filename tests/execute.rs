// ABOUTME: Integration tests for Execute against the in-memory engine.
// ABOUTME: Ordering, idempotency, failure containment, credentials and cancellation.

mod support;

use hadron::HealthProbe;
use hadron::deploy::{DeployErrorKind, HealthStatus};
use hadron::plan::{MANAGED_LABEL, PLAN_LABEL, ResourceKind};
use hadron::report::{Outcome, Status};
use hadron::runtime::MountKind;
use std::time::Duration;
use support::{FakeEngine, Op, image_ref, plan};
use tokio_util::sync::CancellationToken;

fn is_skipped(outcome: &Outcome, needle: &str) -> bool {
    matches!(outcome, Outcome::Skipped { reason } if reason.contains(needle))
}

#[tokio::test(start_paused = true)]
async fn network_and_volume_before_probed_container() {
    let engine = FakeEngine::new().healthy_after("api", 3);
    let plan = plan("web", &engine);

    let host = plan.host("h1").local().build().unwrap();
    let network = plan.network("backend", host).build().unwrap();
    let volume = plan.volume("data", host).build().unwrap();
    let image = plan.image(image_ref("docker.io", "acme/api")).build().unwrap();
    let api = plan
        .container("api", host, image)
        .network(network)
        .volume(volume, "/data")
        .probe(
            HealthProbe::http("/health", 8080)
                .with_timeout(Duration::from_secs(60))
                .with_interval(Duration::from_secs(5)),
        )
        .build()
        .unwrap();

    let report = plan.execute().await;

    assert_eq!(report.status(), &Status::Succeeded);
    assert_eq!(report.get(network).unwrap().outcome, Outcome::Created);
    assert_eq!(report.get(volume).unwrap().outcome, Outcome::Created);
    let api_entry = report.get(api).unwrap();
    assert_eq!(api_entry.outcome, Outcome::Created);
    assert_eq!(api_entry.health, Some(HealthStatus::Healthy));
    assert_eq!(engine.probes("api"), 3);

    let create_api = engine.position(Op::CreateContainer, "api").unwrap();
    assert!(engine.position(Op::CreateNetwork, "backend").unwrap() < create_api);
    assert!(engine.position(Op::CreateVolume, "data").unwrap() < create_api);
    assert!(engine.position(Op::PullImage, &image_ref("docker.io", "acme/api")).unwrap() < create_api);
    assert!(engine.has_container("h1", "api"));
}

#[tokio::test]
async fn second_execute_reports_everything_already_existing() {
    let engine = FakeEngine::new();
    let plan = plan("web", &engine);
    let host = plan.host("h1").local().build().unwrap();
    let network = plan.network("backend", host).build().unwrap();
    let image = plan.image(image_ref("docker.io", "acme/api")).build().unwrap();
    let _api = plan.container("api", host, image).network(network).build().unwrap();

    assert!(plan.execute().await.is_success());
    engine.clear_calls();

    let second = plan.execute().await;
    assert!(second.is_success());
    assert!(engine.mutations().is_empty());
    for entry in second.entries() {
        if entry.kind.is_materialized() {
            assert_eq!(entry.outcome, Outcome::AlreadyExisted, "{}", entry.name);
        }
    }
}

#[tokio::test]
async fn failure_skips_only_the_dependent_subtree() {
    let engine = FakeEngine::new().failing(Op::CreateNetwork, "backend");
    let plan = plan("web", &engine);
    let host = plan.host("h1").local().build().unwrap();
    let network = plan.network("backend", host).build().unwrap();
    let volume = plan.volume("data", host).build().unwrap();
    let image = plan.image(image_ref("docker.io", "acme/api")).build().unwrap();
    let api = plan.container("api", host, image).network(network).build().unwrap();
    let worker = plan
        .container("worker", host, image)
        .volume(volume, "/data")
        .build()
        .unwrap();

    let report = plan.execute().await;

    assert!(matches!(
        report.get(network).unwrap().outcome,
        Outcome::Failed { kind: DeployErrorKind::Create, .. }
    ));
    assert!(is_skipped(&report.get(api).unwrap().outcome, "network 'backend'"));
    assert_eq!(report.get(volume).unwrap().outcome, Outcome::Created);
    assert_eq!(report.get(worker).unwrap().outcome, Outcome::Created);
    assert_eq!(report.status(), &Status::PartiallySucceeded { failures: 2 });
    assert_eq!(report.exit_code(), 1);
    assert!(engine.position(Op::ContainerExists, "api").is_none());
}

#[tokio::test]
async fn existence_check_failure_is_reported_as_such() {
    let engine = FakeEngine::new().failing(Op::VolumeExists, "data");
    let plan = plan("web", &engine);
    let host = plan.host("h1").local().build().unwrap();
    let volume = plan.volume("data", host).build().unwrap();

    let report = plan.execute().await;
    match &report.get(volume).unwrap().outcome {
        Outcome::Failed { kind, reason } => {
            assert_eq!(*kind, DeployErrorKind::ExistenceCheck);
            assert!(reason.contains("data"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(engine.position(Op::CreateVolume, "data").is_none());
}

#[tokio::test]
async fn unreachable_host_does_not_stop_other_hosts() {
    let engine = FakeEngine::new().unreachable("h2");
    let plan = plan("web", &engine);
    let h1 = plan.host("h1").local().build().unwrap();
    let h2 = plan.host("h2").ssh("10.0.0.2").user("deploy").build().unwrap();
    let n1 = plan.network("backend", h1).build().unwrap();
    let n2 = plan.network("backend", h2).build().unwrap();

    let report = plan.execute().await;

    assert_eq!(report.get(h1).unwrap().outcome, Outcome::Ready);
    assert!(matches!(
        report.get(h2).unwrap().outcome,
        Outcome::Failed { kind: DeployErrorKind::Connect, .. }
    ));
    assert_eq!(report.get(n1).unwrap().outcome, Outcome::Created);
    assert!(is_skipped(&report.get(n2).unwrap().outcome, "host 'h2'"));
    assert_eq!(report.get(n2).unwrap().host.as_deref(), Some("h2"));
    assert!(engine.has_network("h1", "backend"));
    assert!(!engine.has_network("h2", "backend"));
}

#[tokio::test]
async fn pulls_authenticate_with_the_domain_registry() {
    let engine = FakeEngine::new();
    let plan = plan("web", &engine);
    let registry = plan.registry("ghcr.io").secret("ghcr").build().unwrap();
    let host = plan.host("h1").local().build().unwrap();
    let image = plan.image(image_ref("ghcr.io", "acme/api")).build().unwrap();
    let _api = plan.container("api", host, image).build().unwrap();

    let report = plan.execute().await;

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(report.get(registry).unwrap().outcome, Outcome::Ready);
    assert_eq!(report.get(image).unwrap().outcome, Outcome::Ready);
    let pulls = engine.pulls();
    assert_eq!(pulls.len(), 1);
    let auth = pulls[0].1.as_ref().expect("pull should be authenticated");
    assert_eq!(auth.server, "ghcr.io");
    assert_eq!(auth.username, "bot");
    assert_eq!(auth.password, "s3cret");
}

#[tokio::test]
async fn mixed_case_image_domain_still_uses_the_registry_credentials() {
    let engine = FakeEngine::new();
    let plan = plan("web", &engine);
    let registry = plan.registry("ghcr.io").secret("ghcr").build().unwrap();
    let host = plan.host("h1").local().build().unwrap();
    let image = plan.image(image_ref("GHCR.io", "acme/api")).build().unwrap();
    let _api = plan.container("api", host, image).build().unwrap();

    let report = plan.execute().await;

    assert!(report.is_success(), "{:?}", report);
    let pulls = engine.pulls();
    assert_eq!(pulls.len(), 1);
    assert_eq!(pulls[0].0, image_ref("ghcr.io", "acme/api"));
    let auth = pulls[0].1.as_ref().expect("pull should be authenticated");
    assert_eq!(auth.server, "ghcr.io");
    assert_eq!(report.get(registry).unwrap().outcome, Outcome::Ready);
}

#[tokio::test]
async fn present_images_are_not_pulled() {
    let reference = image_ref("docker.io", "acme/api");
    let engine = FakeEngine::new().with_image("h1", &reference);
    let plan = plan("web", &engine);
    let host = plan.host("h1").local().build().unwrap();
    let image = plan.image(reference.clone()).build().unwrap();
    let _api = plan.container("api", host, image).build().unwrap();

    assert!(plan.execute().await.is_success());
    assert!(engine.pulls().is_empty());
}

#[tokio::test]
async fn credential_failure_blocks_every_consumer_on_every_host() {
    let engine = FakeEngine::new();
    let plan = plan("web", &engine);
    let registry = plan.registry("ghcr.io").secret("unknown").build().unwrap();
    let h1 = plan.host("h1").local().build().unwrap();
    let h2 = plan.host("h2").local().build().unwrap();
    let image = plan.image(image_ref("ghcr.io", "acme/api")).build().unwrap();
    let c1 = plan.container("api", h1, image).build().unwrap();
    let c2 = plan.container("api", h2, image).build().unwrap();

    let report = plan.execute().await;

    assert!(matches!(
        report.get(registry).unwrap().outcome,
        Outcome::Failed { kind: DeployErrorKind::Credential, .. }
    ));
    assert!(is_skipped(&report.get(image).unwrap().outcome, "registry 'ghcr.io'"));
    assert!(is_skipped(&report.get(c1).unwrap().outcome, "did not succeed"));
    assert!(is_skipped(&report.get(c2).unwrap().outcome, "did not succeed"));
    assert!(engine.mutations().is_empty());
}

#[tokio::test]
async fn container_spec_is_fully_materialized() {
    let engine = FakeEngine::new();
    let plan = plan("shop", &engine);
    let host = plan.host("h1").local().build().unwrap();
    let network = plan.network("backend", host).build().unwrap();
    let volume = plan.volume("data", host).build().unwrap();
    let image = plan.image(image_ref("docker.io", "acme/api")).build().unwrap();
    let _api = plan
        .container("api", host, image)
        .network_with_aliases(network, ["api-internal"])
        .volume_read_only(volume, "/srv/data")
        .bind("/etc/ssl", "/etc/ssl", true)
        .env("MODE", "production")
        .label("team", "payments")
        .port("8080:80")
        .memory("512m")
        .cpus("0.5")
        .restart("always".parse().unwrap())
        .command(["serve", "--port", "80"])
        .build()
        .unwrap();

    assert!(plan.execute().await.is_success());

    let spec = engine.spec("api").unwrap();
    assert_eq!(spec.networks[0].network, "backend");
    assert_eq!(spec.networks[0].aliases, vec!["api-internal".to_string()]);
    assert_eq!(spec.mounts[0].kind, MountKind::Volume);
    assert_eq!(spec.mounts[0].source, "data");
    assert!(spec.mounts[0].read_only);
    assert_eq!(spec.mounts[1].kind, MountKind::Bind);
    assert_eq!(spec.mounts[1].source, "/etc/ssl");
    assert_eq!(spec.env["MODE"], "production");
    assert_eq!(spec.labels["team"], "payments");
    assert_eq!(spec.labels[PLAN_LABEL], "shop");
    assert_eq!(spec.labels[MANAGED_LABEL], "true");
    assert_eq!(spec.ports[0].container_port, 80);
    assert_eq!(spec.limits.memory, Some(512 * 1024 * 1024));
    assert_eq!(spec.limits.cpus, Some(0.5));
    assert_eq!(spec.restart_policy, hadron::RestartPolicy::Always);
    assert_eq!(spec.command.as_deref(), Some(&["serve".to_string(), "--port".to_string(), "80".to_string()][..]));
}

#[tokio::test]
async fn invalid_plan_never_touches_the_runtime() {
    let engine = FakeEngine::new();
    let plan = plan("web", &engine);
    let h1 = plan.host("h1").local().build().unwrap();
    let h2 = plan.host("h2").local().build().unwrap();
    let network = plan.network("backend", h2).build().unwrap();
    let image = plan.image(image_ref("docker.io", "acme/api")).build().unwrap();
    assert!(plan.container("api", h1, image).network(network).build().is_err());

    let report = plan.execute().await;

    assert!(matches!(report.status(), Status::Aborted { .. }));
    assert!(report.entries().is_empty());
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn cancelled_plans_dispatch_nothing() {
    let engine = FakeEngine::new();
    let token = CancellationToken::new();
    let plan = plan("web", &engine).with_cancellation(token.clone());
    let host = plan.host("h1").local().build().unwrap();
    let network = plan.network("backend", host).build().unwrap();
    token.cancel();

    let report = plan.execute().await;

    assert!(is_skipped(&report.get(host).unwrap().outcome, "cancelled"));
    assert!(is_skipped(&report.get(network).unwrap().outcome, "cancelled"));
    assert!(engine.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn deadline_stops_health_polling() {
    let engine = FakeEngine::new().never_healthy("api");
    let plan = plan("web", &engine).with_deadline(Duration::from_secs(12));
    let host = plan.host("h1").local().build().unwrap();
    let image = plan.image(image_ref("docker.io", "acme/api")).build().unwrap();
    let api = plan
        .container("api", host, image)
        .probe(HealthProbe::tcp(5432))
        .build()
        .unwrap();
    let after = plan.network("late", host).depends_on(api).build().unwrap();

    let report = plan.execute().await;

    assert_eq!(report.get(api).unwrap().health, Some(HealthStatus::Cancelled));
    assert!(is_skipped(&report.get(after).unwrap().outcome, ""));
    assert_eq!(engine.probes("api"), 3);
    assert_eq!(report.status(), &Status::PartiallySucceeded { failures: 2 });
}

#[tokio::test]
async fn report_lists_resources_in_registration_order() {
    let engine = FakeEngine::new();
    let plan = plan("web", &engine);
    let host = plan.host("h1").local().build().unwrap();
    let _b = plan.volume("b", host).build().unwrap();
    let _a = plan.network("a", host).build().unwrap();

    let report = plan.execute().await;
    let names: Vec<_> = report.entries().iter().map(|e| (e.kind, e.name.as_str())).collect();
    assert_eq!(
        names,
        vec![
            (ResourceKind::Host, "h1"),
            (ResourceKind::Volume, "b"),
            (ResourceKind::Network, "a"),
        ]
    );
}
