use std::fs;
use std::path::Path;

use homelab::inputs::{self, HomelabInputs};
use homelab::{run_all, schematic_factory, ArtifactWriter, SecretOverrides};

const HOMELAB: &str = r#"
tunnel:
  name: homelab
  id: 6ff42ae2-765d-4adf-8112-31c55c1551ef
  account_id: acc123
  ingress:
    - hostname: grafana.example.com
      service: http://grafana.monitoring:3000
  dns:
    grafana.example.com: {}

talos:
  name: homelab
  endpoint: https://10.0.0.10:6443
  mesh:
    domain: tail1234.ts.net
  cni:
    name: cilium
    values:
      kubeProxyReplacement: true
  control_planes:
    cp-1:
      address: 10.0.0.10
      install_disk: /dev/sda
      platform: metal
  workers:
    w-1:
      address: 10.0.0.20
      install_disk: /dev/sda
      storage:
        enabled: true
        disk: /dev/nvme1n1
        pools:
          - name: tank
            disks: [/dev/sdb, /dev/sdc]
            layout: mirror
    w-2:
      address: 10.0.0.21
      install_disk: /dev/sda

flux:
  repository:
    owner: homelab-infra
    name: fleet
    path: clusters/homelab
"#;

fn load_inputs(dir: &Path) -> HomelabInputs {
    let path = dir.join("homelab.yaml");
    fs::write(&path, HOMELAB).unwrap();
    inputs::load(&path).unwrap()
}

#[tokio::test]
async fn test_all_artifacts_written() {
    let input_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();

    let mut inputs = load_inputs(input_dir.path());
    SecretOverrides {
        ts_authkey: Some("tskey-auth-123".to_string()),
        tunnel_secret: Some("c2VjcmV0".to_string()),
        ..Default::default()
    }
    .apply(&mut inputs);

    let mut writer = ArtifactWriter::new(output_dir.path());
    let factory = schematic_factory(None);
    run_all(&inputs, factory.as_ref(), &mut writer).await.unwrap();

    let root = output_dir.path();
    for file in [
        "tunnel/tunnel-config.yaml",
        "tunnel/dns-records.yaml",
        "tunnel/cloudflared.yaml",
        "tunnel/credentials.json",
        "talos/controlplane.yaml",
        "talos/worker.yaml",
        "talos/talosconfig",
        "talos/schematics.yaml",
        "talos/cilium-values.yaml",
        "talos/nodes/controlplane/cp-1/base.yaml",
        "talos/nodes/controlplane/cp-1/patch.yaml",
        "talos/nodes/controlplane/cp-1/extension-service.yaml",
        "talos/nodes/worker/w-1/patch.yaml",
        "talos/nodes/worker/w-2/patch.yaml",
        "talos/scripts/w-1-pools.sh",
        "flux/install-order.yaml",
        "flux/helm-releases.yaml",
        "flux/secrets.yaml",
        "flux/flux-instance.yaml",
    ] {
        assert!(root.join(file).is_file(), "missing {file}");
    }
    assert!(!root.join("talos/scripts/w-2-pools.sh").exists());

    let service =
        fs::read_to_string(root.join("talos/nodes/controlplane/cp-1/extension-service.yaml"))
            .unwrap();
    assert!(service.contains("TS_AUTHKEY=tskey-auth-123"));

    let script = fs::read_to_string(root.join("talos/scripts/w-1-pools.sh")).unwrap();
    assert!(script.contains("mirror"));
}

#[tokio::test]
async fn test_missing_sections_are_skipped() {
    let output_dir = tempfile::tempdir().unwrap();
    let inputs: HomelabInputs = serde_yaml::from_str(
        "flux:\n  repository:\n    owner: homelab-infra\n    name: fleet\n",
    )
    .unwrap();

    let mut writer = ArtifactWriter::new(output_dir.path());
    run_all(&inputs, schematic_factory(None).as_ref(), &mut writer)
        .await
        .unwrap();

    assert_eq!(writer.written().len(), 4);
    assert!(!output_dir.path().join("talos").exists());
    assert!(!output_dir.path().join("tunnel").exists());
}
