// ABOUTME: Integration tests for plan assembly through the public builders.
// ABOUTME: Validation failures, implicit edges, labels and dispatch order.

mod support;

use hadron::Plan;
use hadron::plan::{DEFAULT_DOCKER_SOCKET, Endpoint, MANAGED_LABEL, PLAN_LABEL, ResourceKind, ValidationError};
use support::{DIGEST, image_ref};

fn local_plan() -> (Plan, hadron::types::Handle<hadron::plan::Host>) {
    let plan = Plan::new("shop");
    let host = plan.host("h1").local().build().unwrap();
    (plan, host)
}

#[test]
fn duplicate_names_are_scoped_per_host() {
    let (plan, h1) = local_plan();
    let h2 = plan.host("h2").local().build().unwrap();

    let _backend = plan.network("backend", h1).build().unwrap();
    let _backend = plan.network("backend", h2).build().unwrap();
    let err = plan.network("backend", h1).build().unwrap_err();

    assert!(matches!(
        err,
        ValidationError::Duplicate { kind: ResourceKind::Network, ref name, host: Some(ref host) }
            if name == "backend" && host == "h1"
    ));
    assert_eq!(plan.len(), 4);
    assert_eq!(plan.validation_error(), Some(err));
}

#[test]
fn containers_cannot_reach_across_hosts() {
    let (plan, h1) = local_plan();
    let h2 = plan.host("h2").local().build().unwrap();
    let network = plan.network("backend", h1).build().unwrap();
    let image = plan.image(image_ref("docker.io", "acme/api")).build().unwrap();

    let err = plan
        .container("api", h2, image)
        .network(network)
        .build()
        .unwrap_err();

    match err {
        ValidationError::CrossHost {
            container,
            container_host,
            kind,
            resource,
            resource_host,
        } => {
            assert_eq!(container, "api");
            assert_eq!(container_host, "h2");
            assert_eq!(kind, ResourceKind::Network);
            assert_eq!(resource, "backend");
            assert_eq!(resource_host, "h1");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn images_must_be_pinned() {
    let (plan, _) = local_plan();
    let err = plan.image("docker.io/acme/api:1.0").build().unwrap_err();
    assert!(matches!(err, ValidationError::UnpinnedImage(_)));

    let err = plan.image("not a reference").build().unwrap_err();
    assert!(matches!(err, ValidationError::InvalidImage { .. }));
}

#[test]
fn registries_need_exactly_one_credential_source() {
    let plan = Plan::new("shop");

    let missing = plan.registry("ghcr.io").build().unwrap_err();
    assert!(matches!(missing, ValidationError::MissingField { field: "credentials", .. }));

    let mixed = plan
        .registry("ghcr.io")
        .username("bot")
        .password("pw")
        .secret("ghcr")
        .build()
        .unwrap_err();
    assert!(matches!(mixed, ValidationError::InvalidField { field: "credentials", .. }));

    let half = plan.registry("ghcr.io").username("bot").build().unwrap_err();
    assert!(matches!(half, ValidationError::MissingField { field: "password", .. }));

    let ok = plan.registry("GHCR.io").secret("ghcr").build().unwrap();
    assert_eq!(plan.find_registry("ghcr.io"), Some(ok));
    assert_eq!(plan.get(ok).unwrap().domain(), "ghcr.io");
}

#[test]
fn handles_from_another_plan_are_rejected() {
    let (plan, _) = local_plan();
    let (other, other_host) = local_plan();
    assert!(other.validation_error().is_none());

    let err = plan.network("backend", other_host).build().unwrap_err();
    assert_eq!(err, ValidationError::ForeignHandle { kind: ResourceKind::Host });
    assert!(plan.get(other_host).is_none());
}

#[test]
fn cycles_poison_the_plan() {
    let (plan, host) = local_plan();
    let a = plan.network("a", host).build().unwrap();
    let b = plan.network("b", host).build().unwrap();

    plan.add_dependency(b, a).unwrap();
    let err = plan.add_dependency(a, b).unwrap_err();

    assert!(matches!(err, ValidationError::Cycle(_)));
    assert_eq!(plan.validation_error(), Some(err));
    assert!(plan.execution_order().is_ok());
}

#[test]
fn containers_depend_implicitly_on_what_they_use() {
    let plan = Plan::new("shop");
    let registry = plan.registry("ghcr.io").secret("ghcr").build().unwrap();
    let host = plan.host("h1").local().build().unwrap();
    let network = plan.network("backend", host).build().unwrap();
    let volume = plan.volume("data", host).build().unwrap();
    let image = plan.image(image_ref("ghcr.io", "acme/api")).build().unwrap();
    let container = plan
        .container("api", host, image)
        .network(network)
        .volume(volume, "/data")
        .build()
        .unwrap();

    let graph = plan.graph();
    let image_deps: Vec<_> = graph.dependencies(image.node()).collect();
    assert_eq!(image_deps, vec![registry.node()]);

    let mut deps: Vec<_> = graph.dependencies(container.node()).collect();
    deps.sort();
    let mut expected = vec![
        registry.node(),
        host.node(),
        network.node(),
        volume.node(),
        image.node(),
    ];
    expected.sort();
    assert_eq!(deps, expected);
    assert_eq!(graph.dependents(network.node()), vec![container.node()]);
}

#[test]
fn containers_carry_plan_labels() {
    let (plan, host) = local_plan();
    let image = plan.image(image_ref("docker.io", "acme/api")).build().unwrap();
    let api = plan
        .container("api", host, image)
        .label("team", "payments")
        .build()
        .unwrap();

    let api = plan.get(api).unwrap();
    assert_eq!(api.labels().get(PLAN_LABEL).map(String::as_str), Some("shop"));
    assert_eq!(api.labels().get(MANAGED_LABEL).map(String::as_str), Some("true"));
    assert_eq!(api.labels().get("team").map(String::as_str), Some("payments"));
}

#[test]
fn execution_order_respects_explicit_edges() {
    let (plan, host) = local_plan();
    let first = plan.volume("first", host).build().unwrap();
    let second = plan.network("second", host).build().unwrap();
    plan.add_dependency(first, second).unwrap();

    let order = plan.execution_order().unwrap();
    assert_eq!(order, vec![host.node(), second.node(), first.node()]);
}

#[test]
fn host_endpoints_are_validated() {
    let plan = Plan::new("shop");

    let none = plan.host("nowhere").build().unwrap_err();
    assert!(matches!(none, ValidationError::MissingField { field: "address", .. }));

    let both = plan.host("both").local().ssh("10.0.0.1").build().unwrap_err();
    assert!(matches!(both, ValidationError::InvalidField { field: "endpoint", .. }));

    let bad_name = plan.host("-edge").local().build().unwrap_err();
    assert!(matches!(bad_name, ValidationError::InvalidName { .. }));

    let edge = plan.host("edge").ssh("10.0.0.1").user("deploy").build().unwrap();
    match plan.get(edge).unwrap().endpoint() {
        Endpoint::Ssh(ssh) => {
            assert_eq!(ssh.address, "10.0.0.1");
            assert_eq!(ssh.port, 22);
            assert_eq!(ssh.user.as_deref(), Some("deploy"));
            assert_eq!(ssh.socket, DEFAULT_DOCKER_SOCKET);
        }
        other => panic!("unexpected endpoint {other:?}"),
    }
}

#[test]
fn equal_images_are_found_again() {
    let plan = Plan::new("shop");
    let reference = format!("docker.io/acme/api:1.0@{}", DIGEST);
    let image = plan.image(reference.clone()).build().unwrap();
    let parsed = hadron::types::ImageRef::parse(&reference).unwrap();
    assert_eq!(plan.find_image(&parsed), Some(image));
}
