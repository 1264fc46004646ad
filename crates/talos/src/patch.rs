//! Per-node patch documents.
//!
//! Layers are merged in this order: network, install, computed labels, the
//! ZFS kernel module, worker storage, then caller labels so they win over
//! anything computed.

use serde_yaml::Value;

use crate::installer::InstallerImage;
use crate::merge::{at, deep_merge, empty, mapping};
use crate::node::{NodeDescriptor, NodeRef, Role, ZFS_EXTENSION};
use crate::storage;

fn network_layer(key: &str, node: &NodeDescriptor) -> Value {
    at(
        &["machine", "network"],
        mapping([
            ("hostname", Value::from(node.hostname_or(key))),
            (
                "interfaces",
                Value::from(vec![mapping([
                    ("interface", Value::from(node.interface_name())),
                    ("dhcp", Value::Bool(node.dhcp)),
                ])]),
            ),
        ]),
    )
}

fn install_layer(node: &NodeDescriptor, image: &InstallerImage) -> Value {
    at(
        &["machine", "install"],
        mapping([
            ("disk", Value::from(node.install_disk.as_str())),
            ("wipe", Value::Bool(node.wipe)),
            ("image", Value::from(image.to_string())),
        ]),
    )
}

fn computed_labels(node: &NodeDescriptor) -> Option<Value> {
    let labels: Vec<(&str, &str)> = [
        ("topology.kubernetes.io/region", node.region.as_deref()),
        ("topology.kubernetes.io/zone", node.zone.as_deref()),
        ("kubernetes.io/hostname", node.hostname.as_deref()),
        ("kubernetes.io/arch", node.arch.as_deref()),
        ("kubernetes.io/os", node.os.as_deref()),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|v| (label, v)))
    .collect();

    (!labels.is_empty()).then(|| at(&["machine", "nodeLabels"], mapping(labels)))
}

fn caller_labels(node: &NodeDescriptor) -> Option<Value> {
    (!node.labels.is_empty()).then(|| {
        at(
            &["machine", "nodeLabels"],
            mapping(node.labels.iter().map(|(k, v)| (k.clone(), v.as_str()))),
        )
    })
}

/// Build the patch document for one node.
#[must_use]
pub fn node_patch(node_ref: &NodeRef, node: &NodeDescriptor, image: &InstallerImage) -> Value {
    let mut layers = vec![
        network_layer(&node_ref.key, node),
        install_layer(node, image),
    ];
    layers.extend(computed_labels(node));

    if node.has_extension(ZFS_EXTENSION) {
        layers.push(at(
            &["machine", "kernel", "modules"],
            Value::from(vec![mapping([("name", "zfs")])]),
        ));
    }
    if node_ref.role == Role::Worker {
        layers.extend(storage::worker_layer(&node.storage));
    }

    layers.extend(caller_labels(node));
    deep_merge(&empty(), &layers)
}
