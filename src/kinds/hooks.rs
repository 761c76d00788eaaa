//! Kind-specific update handling.
//!
//! Functions here operate on raw object bodies and are selected by the
//! [`ResourceKind`] tag of a registry entry.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::cluster::PropagationPolicy;

use super::kind::ResourceKind;

/// Label linking a job's pods to their controller.
pub const CONTROLLER_UID_LABEL: &str = "controller-uid";

/// Label carrying the job name on a job's pods.
pub const JOB_NAME_LABEL: &str = "job-name";

/// Metadata fields owned by the server and carried over from the deployed
/// object onto a dry-run result.
const IDENTITY_FIELDS: &[&str] = &[
    "creationTimestamp",
    "selfLink",
    "uid",
    "resourceVersion",
    "ownerReferences",
];

/// Walks `path` from `value`, creating empty objects in place of nulls, and
/// returns the object at the end. Returns `None` if a non-object is in the
/// way.
fn object_at<'a>(value: &'a mut Value, path: &[&str]) -> Option<&'a mut Map<String, Value>> {
    let mut current = value;
    for key in path {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = current
            .as_object_mut()?
            .entry((*key).to_string())
            .or_insert(Value::Null);
    }
    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    current.as_object_mut()
}

fn is_blank(value: &Value) -> bool {
    value.as_str().is_none_or(|s| s.trim().is_empty())
}

/// Adjusts a desired body before it replaces the deployed object.
pub fn prepare_replace(kind: ResourceKind, desired: &mut Value, deployed: &Value) {
    if kind == ResourceKind::Service {
        prepare_service_replace(desired, deployed);
    }
}

/// Carries server-assigned service fields forward onto the desired body.
///
/// Ports without an explicit node port keep the node port bound to the same
/// port number on the deployed service; an absent node port would otherwise
/// be reallocated. The resource version and an unset cluster IP are taken
/// from the deployed service.
pub fn prepare_service_replace(desired: &mut Value, deployed: &Value) {
    let node_ports: HashMap<u64, u64> = deployed
        .pointer("/spec/ports")
        .and_then(Value::as_array)
        .map(|ports| {
            ports
                .iter()
                .filter_map(|p| Some((p["port"].as_u64()?, p["nodePort"].as_u64()?)))
                .collect()
        })
        .unwrap_or_default();

    if let Some(ports) = desired.pointer_mut("/spec/ports").and_then(Value::as_array_mut) {
        for port in ports {
            if port["nodePort"].as_u64().is_some_and(|n| n != 0) {
                continue;
            }
            let Some(node_port) = port["port"].as_u64().and_then(|p| node_ports.get(&p)) else {
                continue;
            };
            if let Some(port) = port.as_object_mut() {
                port.insert(String::from("nodePort"), Value::from(*node_port));
            }
        }
    }

    if let Some(metadata) = object_at(desired, &["metadata"]) {
        metadata.insert(
            String::from("resourceVersion"),
            deployed["metadata"]["resourceVersion"].clone(),
        );
    }

    let cluster_ip = deployed["spec"]["clusterIP"].clone();
    if let Some(spec) = object_at(desired, &["spec"]) {
        if spec.get("clusterIP").is_none_or(is_blank) && !cluster_ip.is_null() {
            spec.insert(String::from("clusterIP"), cluster_ip);
        }
    }
}

/// Builds the body of a server-side dry-run create for `desired`.
///
/// The name is moved into `generateName` so the dry run cannot collide with
/// the deployed object.
#[must_use]
pub fn dry_run_request(desired: &Value, name: &str, namespace: Option<&str>) -> Value {
    let mut request = desired.clone();
    if let Some(metadata) = object_at(&mut request, &["metadata"]) {
        metadata.remove("name");
        metadata.insert(String::from("generateName"), Value::from(name));
        if let Some(namespace) = namespace {
            metadata.insert(String::from("namespace"), Value::from(namespace));
        }
    }
    request
}

/// Turns a dry-run result into the body used to replace the deployed object.
pub fn recover_after_dry_run(
    kind: ResourceKind,
    result: &mut Value,
    deployed: &Value,
    desired: &Value,
    name: &str,
) {
    if let Some(metadata) = object_at(result, &["metadata"]) {
        metadata.insert(String::from("name"), Value::from(name));
        metadata.remove("generateName");
        for field in IDENTITY_FIELDS {
            match deployed["metadata"].get(*field) {
                Some(value) => {
                    metadata.insert((*field).to_string(), value.clone());
                }
                None => {
                    metadata.remove(*field);
                }
            }
        }
    }

    match kind {
        ResourceKind::Pod => {
            let node_name = deployed["spec"]["nodeName"].clone();
            if let Some(spec) = object_at(result, &["spec"]) {
                spec.insert(String::from("nodeName"), node_name);
            }
            recover_image_pull_policy("/spec", deployed, desired, result);
        }
        ResourceKind::Job => {
            if desired["spec"]["manualSelector"].as_bool() != Some(true) {
                recover_job_labels(result, deployed, name);
            }
            recover_image_pull_policy("/spec/template/spec", deployed, desired, result);
        }
        ResourceKind::StatefulSet => {
            recover_image_pull_policy("/spec/template/spec", deployed, desired, result);
        }
        _ => {}
    }
}

/// Restores the controller labels and selector the server generated for a
/// job without a manual selector.
fn recover_job_labels(result: &mut Value, deployed: &Value, name: &str) {
    let controller_uid = deployed["metadata"]["labels"][CONTROLLER_UID_LABEL].clone();

    for path in [
        &["metadata", "labels"][..],
        &["spec", "template", "metadata", "labels"][..],
    ] {
        if let Some(labels) = object_at(result, path) {
            if !controller_uid.is_null() {
                labels.insert(CONTROLLER_UID_LABEL.to_string(), controller_uid.clone());
            }
            labels.insert(JOB_NAME_LABEL.to_string(), Value::from(name));
        }
    }

    if !controller_uid.is_null() {
        if let Some(match_labels) = object_at(result, &["spec", "selector", "matchLabels"]) {
            match_labels.insert(CONTROLLER_UID_LABEL.to_string(), controller_uid);
        }
    }
}

/// Keeps the deployed image pull policy for containers whose manifest left
/// it unset. Skipped when container counts differ.
fn recover_image_pull_policy(pod_spec: &str, deployed: &Value, desired: &Value, result: &mut Value) {
    let (Some(deployed_spec), Some(desired_spec)) = (deployed.pointer(pod_spec), desired.pointer(pod_spec))
    else {
        return;
    };
    let Some(target_spec) = result.pointer_mut(pod_spec) else {
        return;
    };

    for key in ["initContainers", "containers"] {
        let Some(origin) = deployed_spec[key].as_array() else {
            continue;
        };
        let yaml = desired_spec[key].as_array().map_or(&[][..], Vec::as_slice);
        let Some(target) = target_spec.get_mut(key).and_then(Value::as_array_mut) else {
            return;
        };
        if origin.len() != yaml.len() || origin.len() != target.len() {
            return;
        }
        for ((origin, yaml), target) in origin.iter().zip(yaml).zip(target.iter_mut()) {
            if yaml.get("imagePullPolicy").is_none_or(is_blank) {
                if let Some(target) = target.as_object_mut() {
                    target.insert(
                        String::from("imagePullPolicy"),
                        origin["imagePullPolicy"].clone(),
                    );
                }
            }
        }
    }
}

/// Propagation policy used when deleting objects of `kind`.
#[must_use]
pub const fn delete_propagation(kind: ResourceKind) -> Option<PropagationPolicy> {
    match kind {
        ResourceKind::HorizontalPodAutoscaler => Some(PropagationPolicy::Background),
        _ => None,
    }
}

/// Whether object bodies of `kind` must stay out of log output.
#[must_use]
pub const fn redacts_body(kind: ResourceKind) -> bool {
    matches!(kind, ResourceKind::Secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_node_port_carried_forward() {
        let deployed = json!({
            "metadata": {"name": "web", "resourceVersion": "41"},
            "spec": {
                "clusterIP": "10.0.0.7",
                "ports": [{"port": 80, "nodePort": 30080}, {"port": 443, "nodePort": 30443}]
            }
        });
        let mut desired = json!({
            "metadata": {"name": "web"},
            "spec": {
                "ports": [{"port": 80}, {"port": 443, "nodePort": 31443}, {"port": 8080, "nodePort": 0}]
            }
        });

        prepare_replace(ResourceKind::Service, &mut desired, &deployed);

        assert_eq!(desired["spec"]["ports"][0]["nodePort"], 30080);
        assert_eq!(desired["spec"]["ports"][1]["nodePort"], 31443);
        assert_eq!(desired["spec"]["ports"][2]["nodePort"], 0);
        assert_eq!(desired["metadata"]["resourceVersion"], "41");
        assert_eq!(desired["spec"]["clusterIP"], "10.0.0.7");
    }

    #[test]
    fn test_service_explicit_cluster_ip_kept() {
        let deployed = json!({"metadata": {}, "spec": {"clusterIP": "10.0.0.7"}});
        let mut desired = json!({"metadata": {"name": "web"}, "spec": {"clusterIP": "None"}});
        prepare_service_replace(&mut desired, &deployed);
        assert_eq!(desired["spec"]["clusterIP"], "None");
    }

    #[test]
    fn test_other_kinds_untouched() {
        let deployed = json!({"metadata": {"resourceVersion": "9"}});
        let mut desired = json!({"metadata": {"name": "cfg"}, "data": {}});
        let before = desired.clone();
        prepare_replace(ResourceKind::ConfigMap, &mut desired, &deployed);
        assert_eq!(desired, before);
    }

    #[test]
    fn test_dry_run_request() {
        let desired = json!({"metadata": {"name": "batch"}, "spec": {}});
        let request = dry_run_request(&desired, "batch", Some("jobs"));
        assert!(request["metadata"].get("name").is_none());
        assert_eq!(request["metadata"]["generateName"], "batch");
        assert_eq!(request["metadata"]["namespace"], "jobs");
    }

    #[test]
    fn test_job_recovery() {
        let deployed = json!({
            "metadata": {
                "name": "batch",
                "uid": "u-1",
                "resourceVersion": "77",
                "creationTimestamp": "2024-01-01T00:00:00Z",
                "labels": {"controller-uid": "u-1", "job-name": "batch"}
            },
            "spec": {"template": {"spec": {"containers": [{"name": "c", "imagePullPolicy": "Always"}]}}}
        });
        let desired = json!({
            "metadata": {"name": "batch"},
            "spec": {"template": {"spec": {"containers": [{"name": "c"}]}}}
        });
        let mut result = json!({
            "metadata": {"name": "batchx7k2", "generateName": "batch", "uid": "dry", "labels": {}},
            "spec": {
                "selector": {"matchLabels": {}},
                "template": {
                    "metadata": {"labels": {}},
                    "spec": {"containers": [{"name": "c", "imagePullPolicy": "IfNotPresent"}]}
                }
            }
        });

        recover_after_dry_run(ResourceKind::Job, &mut result, &deployed, &desired, "batch");

        assert_eq!(result["metadata"]["name"], "batch");
        assert!(result["metadata"].get("generateName").is_none());
        assert_eq!(result["metadata"]["uid"], "u-1");
        assert_eq!(result["metadata"]["resourceVersion"], "77");
        assert_eq!(result["metadata"]["creationTimestamp"], "2024-01-01T00:00:00Z");
        assert!(result["metadata"].get("selfLink").is_none());
        assert_eq!(result["metadata"]["labels"]["controller-uid"], "u-1");
        assert_eq!(result["metadata"]["labels"]["job-name"], "batch");
        assert_eq!(result["spec"]["selector"]["matchLabels"]["controller-uid"], "u-1");
        assert_eq!(result["spec"]["template"]["metadata"]["labels"]["job-name"], "batch");
        assert_eq!(
            result["spec"]["template"]["spec"]["containers"][0]["imagePullPolicy"],
            "Always"
        );
    }

    #[test]
    fn test_job_manual_selector_keeps_labels() {
        let deployed = json!({"metadata": {"labels": {"controller-uid": "u-1"}}});
        let desired = json!({"metadata": {"name": "batch"}, "spec": {"manualSelector": true}});
        let mut result = json!({"metadata": {"labels": {"app": "batch"}}, "spec": {}});
        recover_after_dry_run(ResourceKind::Job, &mut result, &deployed, &desired, "batch");
        assert_eq!(result["metadata"]["labels"], json!({"app": "batch"}));
    }

    #[test]
    fn test_pod_recovery_keeps_node_and_explicit_policy() {
        let deployed = json!({
            "metadata": {"uid": "p-1"},
            "spec": {"nodeName": "node-3", "containers": [{"imagePullPolicy": "Always"}]}
        });
        let desired = json!({
            "metadata": {"name": "pod"},
            "spec": {"containers": [{"imagePullPolicy": "Never"}]}
        });
        let mut result = json!({
            "metadata": {},
            "spec": {"containers": [{"imagePullPolicy": "Never"}]}
        });
        recover_after_dry_run(ResourceKind::Pod, &mut result, &deployed, &desired, "pod");
        assert_eq!(result["spec"]["nodeName"], "node-3");
        assert_eq!(result["spec"]["containers"][0]["imagePullPolicy"], "Never");
    }

    #[test]
    fn test_image_pull_policy_skipped_on_count_mismatch() {
        let deployed = json!({"spec": {"containers": [{"imagePullPolicy": "Always"}]}});
        let desired = json!({"spec": {"containers": [{}, {}]}});
        let mut result = json!({"spec": {"containers": [{"imagePullPolicy": "IfNotPresent"}, {}]}});
        recover_image_pull_policy("/spec", &deployed, &desired, &mut result);
        assert_eq!(result["spec"]["containers"][0]["imagePullPolicy"], "IfNotPresent");
    }

    #[test]
    fn test_delete_propagation_and_redaction() {
        assert_eq!(
            delete_propagation(ResourceKind::HorizontalPodAutoscaler),
            Some(PropagationPolicy::Background)
        );
        assert_eq!(delete_propagation(ResourceKind::Deployment), None);
        assert!(redacts_body(ResourceKind::Secret));
        assert!(!redacts_body(ResourceKind::ConfigMap));
    }
}
