//! Worker storage: Longhorn engine settings and ZFS pool setup scripts.

use handlebars::Handlebars;
use serde::Serialize;
use serde_yaml::Value;

use crate::error::TalosError;
use crate::merge::{at, deep_merge, empty, mapping};
use crate::node::{NodeDescriptor, NodeRef, PoolDefinition, WorkerStorage};

/// Storage engine data path, bind-mounted into the kubelet.
pub const ENGINE_MOUNT: &str = "/var/lib/longhorn";

/// Directory holding ZFS encryption keys, bind-mounted into the kubelet.
pub const ZFS_KEY_DIR: &str = "/var/lib/zfs-keys";

/// Labels applied when the storage engine runs on a worker.
pub const ENGINE_LABELS: [(&str, &str); 2] = [
    ("node.longhorn.io/create-default-disk", "true"),
    ("storage.homelab.dev/engine", "longhorn"),
];

/// Label applied to workers that carry ZFS pools.
pub const ZFS_LABEL: &str = "storage.homelab.dev/zfs";

fn bind_mount(path: &str, options: &[&str]) -> Value {
    mapping([
        ("destination", Value::from(path)),
        ("type", Value::from("bind")),
        ("source", Value::from(path)),
        ("options", Value::from(options.to_vec())),
    ])
}

/// Worker-only layer: engine labels and hugepages, pool label, the backing
/// disk and kubelet mounts. `None` when nothing applies.
#[must_use]
pub fn worker_layer(storage: &WorkerStorage) -> Option<Value> {
    let mut layers = Vec::new();

    if storage.enabled {
        layers.push(at(&["machine", "nodeLabels"], mapping(ENGINE_LABELS)));
        layers.push(at(
            &["machine", "sysctls", "vm.nr_hugepages"],
            Value::from(storage.hugepages.to_string()),
        ));
    }
    if !storage.pools.is_empty() {
        layers.push(at(&["machine", "nodeLabels", ZFS_LABEL], Value::from("true")));
    }

    let mut mounts = Vec::new();
    if let Some(disk) = &storage.disk {
        mounts.push(bind_mount(ENGINE_MOUNT, &["bind", "rshared", "rw"]));
        layers.push(at(
            &["machine", "disks"],
            Value::from(vec![mapping([
                ("device", Value::from(disk.as_str())),
                (
                    "partitions",
                    Value::from(vec![mapping([("mountpoint", ENGINE_MOUNT)])]),
                ),
            ])]),
        ));
    }
    if !storage.pools.is_empty() {
        mounts.push(bind_mount(ZFS_KEY_DIR, &["bind", "rw"]));
    }
    if !mounts.is_empty() {
        layers.push(at(&["machine", "kubelet", "extraMounts"], Value::from(mounts)));
    }

    if layers.is_empty() {
        None
    } else {
        Some(deep_merge(&empty(), &layers))
    }
}

const POOL_SCRIPT: &str = r#"#!/usr/bin/env bash
# ZFS pool setup
set -euo pipefail

NODE={{node}}
IMAGE="${ZFS_DEBUG_IMAGE:-alpine:3.20}"

run_on_node() {
  kubectl debug "node/${NODE}" --profile=sysadmin --image="${IMAGE}" --quiet -i -- \
    chroot /host "$@"
}
{{#each pools}}

POOL={{name}}
if run_on_node zpool list -H -o name "${POOL}" >/dev/null 2>&1; then
  echo "Pool ${POOL} already exists on ${NODE}"
else
{{#if key_file}}
  run_on_node sh -c 'test -f "$1" || (umask 077 && head -c 32 /dev/urandom > "$1")' sh {{key_file}}
{{/if}}
  run_on_node zpool create -f{{#each options}} {{this}}{{/each}} "${POOL}"{{#if vdev}} {{vdev}}{{/if}}{{#each disks}} {{this}}{{/each}}
  echo "Created pool ${POOL} on ${NODE}"
fi
{{/each}}
"#;

/// Quote a word for a POSIX shell; words made only of safe characters pass through.
#[must_use]
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[derive(Serialize)]
struct PoolContext {
    name: String,
    vdev: Option<&'static str>,
    disks: Vec<String>,
    options: Vec<String>,
    key_file: Option<String>,
}

#[derive(Serialize)]
struct ScriptContext {
    node: String,
    pools: Vec<PoolContext>,
}

fn pool_context(pool: &PoolDefinition) -> PoolContext {
    let mut options = vec![
        "-o ashift=12".to_string(),
        format!("-m {}", shell_quote(&format!("/var/mnt/{}", pool.name))),
        "-O compression=lz4".to_string(),
        "-O atime=off".to_string(),
    ];
    let key_file = pool
        .encrypted
        .then(|| format!("{ZFS_KEY_DIR}/{}.key", pool.name));
    if let Some(key_file) = &key_file {
        options.push("-O encryption=aes-256-gcm".to_string());
        options.push("-O keyformat=raw".to_string());
        options.push(format!(
            "-O {}",
            shell_quote(&format!("keylocation=file://{key_file}"))
        ));
    }
    options.extend(
        pool.properties
            .iter()
            .map(|(key, value)| format!("-O {}", shell_quote(&format!("{key}={value}")))),
    );

    PoolContext {
        name: shell_quote(&pool.name),
        vdev: pool.layout.vdev_keyword(),
        disks: pool.disks.iter().map(|disk| shell_quote(disk)).collect(),
        options,
        key_file: key_file.as_deref().map(shell_quote),
    }
}

/// Executable pool setup script for one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolScript {
    /// Worker the script targets.
    pub node: NodeRef,
    /// Node name as Kubernetes knows it.
    pub display_name: String,
    /// Script body.
    pub script: String,
}

/// Renders pool setup scripts from the embedded template.
pub struct PoolScriptRenderer {
    handlebars: Handlebars<'static>,
}

impl PoolScriptRenderer {
    /// Create a renderer with the embedded template.
    ///
    /// # Errors
    ///
    /// Returns an error if the template fails to parse.
    pub fn new() -> Result<Self, TalosError> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string("pools", POOL_SCRIPT)
            .map_err(Box::new)?;
        Ok(Self { handlebars })
    }

    /// Render the script for a worker; `None` when it has no pools.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn render(
        &self,
        node_ref: &NodeRef,
        node: &NodeDescriptor,
    ) -> Result<Option<PoolScript>, TalosError> {
        if node.storage.pools.is_empty() {
            return Ok(None);
        }

        let display_name = node.hostname_or(&node_ref.key).to_string();
        let context = ScriptContext {
            node: shell_quote(&display_name),
            pools: node.storage.pools.iter().map(pool_context).collect(),
        };
        let script = self.handlebars.render("pools", &context)?;

        Ok(Some(PoolScript {
            node: node_ref.clone(),
            display_name,
            script,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::lookup;
    use crate::node::{PoolLayout, Role};

    fn pools() -> Vec<PoolDefinition> {
        vec![
            PoolDefinition::new(
                "tank",
                vec!["/dev/disk/by-id/a".to_string(), "/dev/disk/by-id/b".to_string()],
            )
            .with_layout(PoolLayout::Mirror)
            .encrypted(),
        ]
    }

    #[test]
    fn test_empty_storage_has_no_layer() {
        assert!(worker_layer(&WorkerStorage::default()).is_none());
    }

    #[test]
    fn test_engine_enabled_sets_labels_and_hugepages() {
        let layer = worker_layer(&WorkerStorage {
            enabled: true,
            hugepages: 2048,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            lookup(&layer, &["machine", "nodeLabels", "node.longhorn.io/create-default-disk"]),
            Some(&Value::from("true"))
        );
        assert_eq!(
            lookup(&layer, &["machine", "sysctls", "vm.nr_hugepages"]),
            Some(&Value::from("2048"))
        );
        assert!(lookup(&layer, &["machine", "kubelet"]).is_none());
    }

    #[test]
    fn test_both_mounts_are_independent() {
        let only_disk = worker_layer(&WorkerStorage {
            disk: Some("/dev/nvme1n1".to_string()),
            ..Default::default()
        })
        .unwrap();
        let mounts = lookup(&only_disk, &["machine", "kubelet", "extraMounts"])
            .and_then(Value::as_sequence)
            .unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0]["destination"], Value::from(ENGINE_MOUNT));

        let both = worker_layer(&WorkerStorage {
            disk: Some("/dev/nvme1n1".to_string()),
            pools: pools(),
            ..Default::default()
        })
        .unwrap();
        let mounts = lookup(&both, &["machine", "kubelet", "extraMounts"])
            .and_then(Value::as_sequence)
            .unwrap();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0]["destination"], Value::from(ENGINE_MOUNT));
        assert_eq!(mounts[1]["destination"], Value::from(ZFS_KEY_DIR));
        assert_eq!(
            lookup(&both, &["machine", "nodeLabels", ZFS_LABEL]),
            Some(&Value::from("true"))
        );
    }

    #[test]
    fn test_script_rendered_only_with_pools() {
        let renderer = PoolScriptRenderer::new().unwrap();
        let node_ref = NodeRef::new(Role::Worker, "w-1");

        let bare = NodeDescriptor::new("10.0.0.20", "/dev/sda");
        assert!(renderer.render(&node_ref, &bare).unwrap().is_none());

        let with_pools = bare.with_hostname("bravo").with_storage(WorkerStorage {
            pools: pools(),
            ..Default::default()
        });
        let script = renderer.render(&node_ref, &with_pools).unwrap().unwrap();

        assert_eq!(script.display_name, "bravo");
        assert!(script.script.starts_with("#!/usr/bin/env bash"));
        assert!(script.script.contains("NODE=bravo\n"));
        assert!(script.script.contains("POOL=tank\n"));
        assert!(script.script.contains(
            "zpool create -f -o ashift=12 -m /var/mnt/tank -O compression=lz4 -O atime=off -O encryption=aes-256-gcm -O keyformat=raw -O keylocation=file:///var/lib/zfs-keys/tank.key \"${POOL}\" mirror /dev/disk/by-id/a /dev/disk/by-id/b"
        ));
        assert!(script.script.contains("' sh /var/lib/zfs-keys/tank.key\n"));
    }

    #[test]
    fn test_unencrypted_pool_has_no_key_step() {
        let renderer = PoolScriptRenderer::new().unwrap();
        let node = NodeDescriptor::new("10.0.0.20", "/dev/sda").with_storage(WorkerStorage {
            pools: vec![PoolDefinition::new("scratch", vec!["/dev/sdb".to_string()])],
            ..Default::default()
        });

        let script = renderer
            .render(&NodeRef::new(Role::Worker, "w-2"), &node)
            .unwrap()
            .unwrap();

        assert_eq!(script.display_name, "w-2");
        assert!(!script.script.contains("urandom"));
        assert!(script.script.contains("POOL=scratch\n"));
        assert!(script.script.contains("-O atime=off \"${POOL}\" /dev/sdb"));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/dev/disk/by-id/a"), "/dev/disk/by-id/a");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("my pool"), "'my pool'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$(reboot)"), "'$(reboot)'");
    }

    #[test]
    fn test_unusual_names_are_quoted() {
        let renderer = PoolScriptRenderer::new().unwrap();
        let mut pool = PoolDefinition::new("bulk data", vec!["/dev/disk/by-id/usb disk".to_string()])
            .encrypted();
        pool.properties
            .insert("com.example:note".to_string(), "a b".to_string());
        let node = NodeDescriptor::new("10.0.0.20", "/dev/sda")
            .with_hostname("o'brien")
            .with_storage(WorkerStorage {
                pools: vec![pool],
                ..Default::default()
            });

        let script = renderer
            .render(&NodeRef::new(Role::Worker, "w-1"), &node)
            .unwrap()
            .unwrap()
            .script;

        assert!(script.contains(r"NODE='o'\''brien'"));
        assert!(script.contains("POOL='bulk data'\n"));
        assert!(script.contains("-m '/var/mnt/bulk data'"));
        assert!(script.contains("-O 'keylocation=file:///var/lib/zfs-keys/bulk data.key'"));
        assert!(script.contains("-O 'com.example:note=a b'"));
        assert!(script.contains("' sh '/var/lib/zfs-keys/bulk data.key'\n"));
        assert!(script.contains("'/dev/disk/by-id/usb disk'\n  echo \"Created pool ${POOL} on ${NODE}\""));
    }
}
