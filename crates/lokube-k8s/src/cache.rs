use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::watcher::{Config as WatcherConfig, Error as WatcherError, Event, watcher};
use kube::{Api, Client};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lokube_types::normalize_label_key;

const WATCH_RETRY_DELAY: Duration = Duration::from_secs(5);

/// In-memory mirror of the pods visible to one watch scope (a namespace,
/// or the whole cluster). Kept current by a background watch task; reads
/// are snapshot copies and never touch the API server.
#[derive(Clone)]
pub struct PodCache {
    api: Api<Pod>,
    namespace: Option<String>,
    store: Arc<RwLock<HashMap<String, Arc<Pod>>>>,
}

impl PodCache {
    pub fn new(client: Client, namespace: Option<&str>) -> Self {
        let api = match namespace {
            Some(ns) => {
                info!(namespace = ns, "initializing pod watcher for namespace");
                Api::namespaced(client, ns)
            }
            None => {
                info!("initializing cluster-wide pod watcher");
                Api::all(client)
            }
        };
        Self {
            api,
            namespace: namespace.map(str::to_owned),
            store: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The namespace this cache is restricted to, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Snapshot of all pods currently known to this cache.
    pub fn pods(&self) -> Vec<Arc<Pod>> {
        self.store.read().values().cloned().collect()
    }

    /// Insert or update a pod. The watch loop drives this in production;
    /// it is public so a cache can be seeded without a cluster.
    pub fn apply(&self, pod: Pod) {
        self.store.write().insert(pod_key(&pod), Arc::new(pod));
    }

    fn remove(&self, pod: &Pod) {
        self.store.write().remove(&pod_key(pod));
    }

    /// Watches pods until cancelled, restarting the watch after failures.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                ended = self.watch() => match ended {
                    Ok(()) => debug!("pod watch stream ended, restarting"),
                    Err(err) => warn!(error = %err, "pod watch failed, restarting"),
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(WATCH_RETRY_DELAY) => {}
            }
        }
    }

    async fn watch(&self) -> Result<(), WatcherError> {
        let mut events = watcher(self.api.clone(), WatcherConfig::default()).boxed();
        // Relist snapshots build up here and replace the store only once
        // complete, so listings keep serving the previous state meanwhile.
        let mut pending: HashMap<String, Arc<Pod>> = HashMap::new();
        while let Some(event) = events.try_next().await? {
            match event {
                Event::Init => pending.clear(),
                Event::InitApply(pod) => {
                    pending.insert(pod_key(&pod), Arc::new(pod));
                }
                Event::InitDone => {
                    let count = pending.len();
                    *self.store.write() = std::mem::take(&mut pending);
                    debug!(pods = count, "pod cache synchronized");
                }
                Event::Apply(pod) => self.apply(pod),
                Event::Delete(pod) => self.remove(&pod),
            }
        }
        Ok(())
    }
}

fn pod_key(pod: &Pod) -> String {
    format!(
        "{}/{}",
        pod.metadata.namespace.as_deref().unwrap_or(""),
        pod.metadata.name.as_deref().unwrap_or("")
    )
}

/// The set of pod caches backing one server: a single cluster-wide cache,
/// or one cache per configured namespace restriction. Listings concatenate
/// and deduplicate across caches.
pub struct PodCacheSet {
    caches: Vec<PodCache>,
}

impl PodCacheSet {
    pub fn new(client: Client, namespaces: &[String]) -> Self {
        let caches = if namespaces.is_empty() {
            vec![PodCache::new(client, None)]
        } else {
            namespaces
                .iter()
                .map(|ns| PodCache::new(client.clone(), Some(ns)))
                .collect()
        };
        Self { caches }
    }

    /// Starts one watch task per cache under the given token.
    pub fn spawn(&self, cancel: &CancellationToken) {
        for cache in &self.caches {
            let cache = cache.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { cache.run(cancel).await });
        }
    }

    /// Routes a pod into the cache covering its namespace. Seeding helper
    /// for embedding and tests; watch tasks do this in production.
    pub fn apply(&self, pod: Pod) {
        let namespace = pod.metadata.namespace.as_deref();
        let cache = self
            .caches
            .iter()
            .find(|c| c.namespace().is_none() || c.namespace() == namespace)
            .unwrap_or(&self.caches[0]);
        cache.apply(pod);
    }

    /// Snapshot of all pods across every cache.
    pub fn pods(&self) -> Vec<Arc<Pod>> {
        self.caches.iter().flat_map(|c| c.pods()).collect()
    }

    /// Distinct namespaces with at least one pod.
    pub fn namespaces(&self) -> Vec<String> {
        let set: BTreeSet<String> = self
            .pods()
            .into_iter()
            .filter_map(|p| p.metadata.namespace.clone())
            .collect();
        set.into_iter().collect()
    }

    /// Names of all known pods.
    pub fn pod_names(&self) -> Vec<String> {
        let set: BTreeSet<String> = self
            .pods()
            .into_iter()
            .filter_map(|p| p.metadata.name.clone())
            .collect();
        set.into_iter().collect()
    }

    /// Distinct container names across all pods, init containers included.
    pub fn container_names(&self) -> Vec<String> {
        let mut set = BTreeSet::new();
        for pod in self.pods() {
            if let Some(spec) = &pod.spec {
                for container in spec
                    .containers
                    .iter()
                    .chain(spec.init_containers.iter().flatten())
                {
                    set.insert(container.name.clone());
                }
            }
        }
        set.into_iter().collect()
    }

    /// Distinct pod label keys, normalized the same way the resolver
    /// normalizes them before matching.
    pub fn label_names(&self) -> Vec<String> {
        let mut set = BTreeSet::new();
        for pod in self.pods() {
            if let Some(labels) = &pod.metadata.labels {
                for key in labels.keys() {
                    set.insert(normalize_label_key(key));
                }
            }
        }
        set.into_iter().collect()
    }

    /// Distinct values of the pod label whose normalized key matches.
    pub fn label_values(&self, name: &str) -> Vec<String> {
        let mut set = BTreeSet::new();
        for pod in self.pods() {
            if let Some(labels) = &pod.metadata.labels {
                for (key, value) in labels {
                    if normalize_label_key(key) == name {
                        set.insert(value.clone());
                    }
                }
            }
        }
        set.into_iter().collect()
    }
}
