//! In-memory cluster used by reconciliation tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{ClusterError, KubeDeployError, Result};

use super::api::{ClusterApi, ObjectRef, RequestOptions};

/// Stores objects by path and assigns server-side fields the way an API
/// server would.
#[derive(Debug, Default)]
pub struct MemoryCluster {
    objects: Mutex<BTreeMap<String, Value>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, Failure>>,
    counter: Mutex<u64>,
}

#[derive(Debug, Clone)]
struct Failure {
    status: u16,
    body: String,
    writes_only: bool,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object as if it had been created earlier.
    pub fn insert(&self, target: &ObjectRef, body: Value) {
        self.objects.lock().unwrap().insert(target.path(), body);
    }

    pub fn object(&self, target: &ObjectRef) -> Option<Value> {
        self.objects.lock().unwrap().get(&target.path()).cloned()
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }

    /// Makes every call touching an object with this name fail.
    pub fn fail_on(&self, name: &str, status: u16, body: &str) {
        self.set_failure(name, status, body, false);
    }

    /// Makes persisting calls (`POST`, `PUT`, `PATCH`, `DELETE`) on an object
    /// with this name fail. Reads and dry runs still succeed.
    pub fn fail_on_write(&self, name: &str, status: u16) {
        self.set_failure(name, status, "injected write failure", true);
    }

    fn set_failure(&self, name: &str, status: u16, body: &str, writes_only: bool) {
        self.failures.lock().unwrap().insert(
            name.to_string(),
            Failure {
                status,
                body: body.to_string(),
                writes_only,
            },
        );
    }

    /// Recorded calls as `VERB path` lines, in order. Creates and dry runs
    /// record the collection path they are posted to.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded writes, excluding reads and dry runs.
    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("GET") && !c.starts_with("DRYRUN"))
            .collect()
    }

    /// Records `verb path` and returns the injected failure for `target`,
    /// if any. A 404 surfaces as not-found, the way the real client maps it.
    fn record(&self, verb: &str, path: &str, target: &ObjectRef) -> Result<()> {
        self.calls.lock().unwrap().push(format!("{verb} {path}"));

        let name = target.name.clone().unwrap_or_default();
        let Some(failure) = self.failures.lock().unwrap().get(&name).cloned() else {
            return Ok(());
        };
        let persisting = !matches!(verb, "GET" | "DRYRUN");
        if failure.writes_only && !persisting {
            return Ok(());
        }
        if failure.status == 404 {
            return Err(Self::not_found(target));
        }
        Err(ClusterError::api_error(failure.status, failure.body).into())
    }

    fn next(&self) -> u64 {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        *counter
    }

    fn not_found(target: &ObjectRef) -> KubeDeployError {
        ClusterError::NotFound {
            kind: target.kind.clone(),
            name: target.name.clone().unwrap_or_default(),
        }
        .into()
    }

    fn assign_server_fields(&self, body: &mut Value, uid: Option<Value>) {
        let n = self.next();
        body["metadata"]["uid"] = uid.unwrap_or_else(|| json!(format!("uid-{n}")));
        body["metadata"]["resourceVersion"] = json!(n.to_string());

        if body["kind"] == "Service" {
            if body["spec"]["clusterIP"].as_str().is_none_or(str::is_empty) {
                body["spec"]["clusterIP"] = json!(format!("10.0.0.{n}"));
            }
            if let Some(ports) = body["spec"]["ports"].as_array_mut() {
                for (i, port) in ports.iter_mut().enumerate() {
                    if port["nodePort"].as_u64().unwrap_or(0) == 0 {
                        port["nodePort"] = json!(31000 + n * 10 + i as u64);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ClusterApi for MemoryCluster {
    async fn get(&self, target: &ObjectRef, _options: RequestOptions) -> Result<Value> {
        self.record("GET", &target.path(), target)?;
        self.object(target).ok_or_else(|| Self::not_found(target))
    }

    async fn create(
        &self,
        target: &ObjectRef,
        body: &Value,
        options: RequestOptions,
    ) -> Result<Value> {
        let mut created = body.clone();
        if options.dry_run {
            self.record("DRYRUN", &target.collection().path(), target)?;
            let generated = format!(
                "{}dryrun",
                created["metadata"]["generateName"].as_str().unwrap_or_default()
            );
            created["metadata"]["name"] = json!(generated);
            self.assign_server_fields(&mut created, None);
            return Ok(created);
        }

        self.record("POST", &target.collection().path(), target)?;
        if self.object(target).is_some() {
            return Err(ClusterError::api_error(409, "AlreadyExists").into());
        }
        self.assign_server_fields(&mut created, None);
        self.insert(target, created.clone());
        Ok(created)
    }

    async fn replace(
        &self,
        target: &ObjectRef,
        body: &Value,
        _options: RequestOptions,
    ) -> Result<Value> {
        self.record("PUT", &target.path(), target)?;
        let existing = self.object(target).ok_or_else(|| Self::not_found(target))?;
        let mut replaced = body.clone();
        self.assign_server_fields(&mut replaced, Some(existing["metadata"]["uid"].clone()));
        self.insert(target, replaced.clone());
        Ok(replaced)
    }

    async fn patch(
        &self,
        target: &ObjectRef,
        body: &Value,
        _options: RequestOptions,
    ) -> Result<Value> {
        self.record("PATCH", &target.path(), target)?;
        let mut existing = self.object(target).ok_or_else(|| Self::not_found(target))?;
        merge(&mut existing, body);
        self.insert(target, existing.clone());
        Ok(existing)
    }

    async fn delete(&self, target: &ObjectRef, _options: RequestOptions) -> Result<Value> {
        self.record("DELETE", &target.path(), target)?;
        self.objects
            .lock()
            .unwrap()
            .remove(&target.path())
            .map(|_| json!({"kind": "Status", "status": "Success"}))
            .ok_or_else(|| Self::not_found(target))
    }

    fn server(&self) -> &str {
        "https://memory.cluster.local"
    }
}

fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                merge(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}
