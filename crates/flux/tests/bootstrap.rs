use flux::{compose_bootstrap, FluxSpec, StepKind};

fn fleet() -> FluxSpec {
    let mut spec = FluxSpec::new("homelab-infra", "fleet")
        .with_path("clusters/homelab")
        .with_component("image-reflector-controller");
    spec.sops.age_key = Some("AGE-SECRET-KEY-1XYZ".to_string());
    spec.git.token = Some("ghp_abc".to_string());
    spec
}

#[test]
fn test_instance_waits_on_operator_and_secrets() {
    let bootstrap = compose_bootstrap(&fleet());

    let instance_step = bootstrap.plan.last().unwrap();
    assert_eq!(instance_step.kind, StepKind::FluxInstance);

    let secret_names: Vec<&str> = bootstrap
        .secrets
        .iter()
        .map(|s| s.metadata.name.as_str())
        .collect();
    for name in secret_names {
        assert!(instance_step.depends_on.iter().any(|d| d == name));
    }
    assert!(instance_step.depends_on.iter().any(|d| d == "flux-operator"));
}

#[test]
fn test_releases_match_plan() {
    let bootstrap = compose_bootstrap(&fleet());

    let helm_steps: Vec<&str> = bootstrap
        .plan
        .iter()
        .filter(|s| s.kind == StepKind::HelmRelease)
        .map(|s| s.name.as_str())
        .collect();
    let releases: Vec<&str> = bootstrap.releases.iter().map(|r| r.name.as_str()).collect();

    assert_eq!(helm_steps, releases);
}

#[test]
fn test_rendered_documents_parse() {
    let bootstrap = compose_bootstrap(&fleet());

    let instance: serde_yaml::Value =
        serde_yaml::from_str(&bootstrap.instance_yaml().unwrap()).unwrap();
    assert_eq!(
        instance["spec"]["sync"]["path"],
        serde_yaml::Value::from("clusters/homelab")
    );
    assert_eq!(
        instance["spec"]["components"].as_sequence().map(Vec::len),
        Some(5)
    );

    let plan: Vec<serde_yaml::Value> =
        serde_yaml::from_str(&bootstrap.plan_yaml().unwrap()).unwrap();
    assert_eq!(plan.len(), 5);

    let releases: Vec<serde_yaml::Value> =
        serde_yaml::from_str(&bootstrap.releases_yaml().unwrap()).unwrap();
    assert_eq!(releases.len(), 2);

    let secrets = bootstrap.secrets_yaml().unwrap();
    assert!(secrets.contains("age.agekey: AGE-SECRET-KEY-1XYZ"));
    assert!(secrets.contains("password: ghp_abc"));
}
