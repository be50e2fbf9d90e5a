use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use kube::api::LogParams;
use kube::{Api, Client};
use tracing::debug;

use lokube_types::{
    LogByteStream, LogLabels, LogSource, LogStreamFactory, PipelineError, QueryOpts,
    StreamOpenError, normalize_label_key,
};

use crate::cache::PodCacheSet;

/// Opens one container's log stream through the Kubernetes API. Created by
/// the resolver, invoked once by the pipeline's source reader.
struct PodLogStreamFactory {
    api: Api<Pod>,
    pod_name: String,
    container: String,
    follow: bool,
    since: DateTime<Utc>,
    previous: bool,
}

impl PodLogStreamFactory {
    fn params(&self) -> LogParams {
        LogParams {
            container: Some(self.container.clone()),
            // A terminated predecessor cannot be followed.
            follow: self.follow && !self.previous,
            previous: self.previous,
            since_time: Some(self.since),
            timestamps: true,
            ..LogParams::default()
        }
    }
}

#[async_trait]
impl LogStreamFactory for PodLogStreamFactory {
    async fn open(&self) -> Result<LogByteStream, StreamOpenError> {
        match self.api.log_stream(&self.pod_name, &self.params()).await {
            Ok(stream) => Ok(Box::pin(stream)),
            // The API server's message is what readers inspect to tell the
            // expected previous-terminated-container case apart.
            Err(kube::Error::Api(response)) => Err(StreamOpenError::new(response.message)),
            Err(err) => Err(StreamOpenError::new(err.to_string())),
        }
    }
}

/// Enumerates the log sources a query selects from the current pod cache
/// snapshot: one source per matching container, plus a previous-container
/// source when the current run cannot cover the queried range.
pub fn resolve_sources(
    client: &Client,
    cache: &PodCacheSet,
    opts: &QueryOpts,
) -> Result<Vec<LogSource>, PipelineError> {
    let mut sources = Vec::new();

    for pod in cache.pods() {
        if pod.status.as_ref().and_then(|s| s.reason.as_deref()) == Some("Evicted") {
            continue;
        }
        let Some(name) = pod.metadata.name.clone() else {
            continue;
        };
        let namespace = pod.metadata.namespace.clone().unwrap_or_default();
        let Some(spec) = pod.spec.as_ref() else {
            continue;
        };
        let api: Api<Pod> = Api::namespaced(client.clone(), &namespace);

        for container in spec
            .containers
            .iter()
            .chain(spec.init_containers.iter().flatten())
        {
            let labels = source_labels(&pod, &namespace, &name, &container.name);
            if !opts.selector.matches(&labels) {
                continue;
            }
            let labels = Arc::new(labels);

            sources.push(LogSource::new(
                Arc::clone(&labels),
                false,
                Box::new(PodLogStreamFactory {
                    api: api.clone(),
                    pod_name: name.clone(),
                    container: container.name.clone(),
                    follow: opts.tail,
                    since: opts.from,
                    previous: false,
                }),
            ));

            if needs_previous(&pod, &container.name, opts.from) {
                let mut previous_labels = (*labels).clone();
                previous_labels.insert("previous", "true");
                sources.push(LogSource::new(
                    Arc::new(previous_labels),
                    true,
                    Box::new(PodLogStreamFactory {
                        api: api.clone(),
                        pod_name: name.clone(),
                        container: container.name.clone(),
                        follow: opts.tail,
                        since: opts.from,
                        previous: true,
                    }),
                ));
            }
        }
    }

    debug!(sources = sources.len(), "resolved log sources");
    Ok(sources)
}

/// Labels a source carries into matching and responses: the pod's own
/// labels under normalized keys, overridden by the synthetic keys.
fn source_labels(pod: &Pod, namespace: &str, pod_name: &str, container: &str) -> LogLabels {
    let mut labels = LogLabels::new();
    if let Some(pod_labels) = &pod.metadata.labels {
        for (key, value) in pod_labels {
            labels.insert(normalize_label_key(key), value.clone());
        }
    }
    labels.insert("namespace", namespace);
    labels.insert("namespace_name", namespace);
    labels.insert("pod", pod_name);
    labels.insert("pod_name", pod_name);
    labels.insert("container", container);
    labels.insert("container_name", container);
    labels
}

/// True when the container's current run cannot cover the queried range:
/// it is not running at all, or it started only after `from`.
fn needs_previous(pod: &Pod, container: &str, from: DateTime<Utc>) -> bool {
    let statuses = pod.status.iter().flat_map(|s| {
        s.container_statuses
            .iter()
            .flatten()
            .chain(s.init_container_statuses.iter().flatten())
    });
    for status in statuses {
        if status.name != container {
            continue;
        }
        let started_at = status
            .state
            .as_ref()
            .and_then(|state| state.running.as_ref())
            .and_then(|running| running.started_at.as_ref());
        return match started_at {
            Some(started) => started.0 > from,
            None => true,
        };
    }
    true
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use k8s_openapi::api::core::v1::{
        Container, ContainerState, ContainerStateRunning, ContainerStatus, PodSpec, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    use lokube_types::{LabelMatcher, MatchOp, Selector};

    use super::*;

    fn test_client() -> Client {
        let config = kube::Config::new("http://127.0.0.1:8080".parse().unwrap());
        Client::try_from(config).expect("offline client")
    }

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn opts(selector: Selector, from: &str) -> QueryOpts {
        QueryOpts {
            selector,
            from: ts(from),
            to: ts("9999-01-01T00:00:00Z"),
            limit: 1000,
            filter: None,
            tail: false,
            tail_flush_interval: Duration::from_secs(1),
        }
    }

    fn selector(name: &str, op: MatchOp, value: &str) -> Selector {
        Selector::new(vec![LabelMatcher::new(name, op, value).unwrap()])
    }

    fn running_status(container: &str, started_at: &str) -> ContainerStatus {
        ContainerStatus {
            name: container.to_string(),
            state: Some(ContainerState {
                running: Some(ContainerStateRunning {
                    started_at: Some(Time(ts(started_at))),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn running_pod(name: &str, labels: &[(&str, &str)], started_at: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("prod".to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "api".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            status: Some(PodStatus {
                container_statuses: Some(vec![running_status("api", started_at)]),
                ..Default::default()
            }),
        }
    }

    fn seeded_cache(pods: Vec<Pod>) -> PodCacheSet {
        let cache = PodCacheSet::new(test_client(), &[]);
        for pod in pods {
            cache.apply(pod);
        }
        cache
    }

    #[tokio::test]
    async fn test_resolves_matching_container() {
        let cache = seeded_cache(vec![running_pod(
            "api-0",
            &[("app", "api")],
            "2023-01-01T00:00:00Z",
        )]);
        let opts = opts(selector("app", MatchOp::Eq, "api"), "2024-01-01T00:00:00Z");

        let sources = resolve_sources(&test_client(), &cache, &opts).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(!sources[0].previous());
        let labels = sources[0].labels();
        assert_eq!(labels.get("app"), Some("api"));
        assert_eq!(labels.get("namespace"), Some("prod"));
        assert_eq!(labels.get("namespace_name"), Some("prod"));
        assert_eq!(labels.get("pod"), Some("api-0"));
        assert_eq!(labels.get("pod_name"), Some("api-0"));
        assert_eq!(labels.get("container"), Some("api"));
        assert_eq!(labels.get("container_name"), Some("api"));
        assert_eq!(labels.get("previous"), None);
    }

    #[tokio::test]
    async fn test_skips_non_matching_pods() {
        let cache = seeded_cache(vec![running_pod(
            "web-0",
            &[("app", "web")],
            "2023-01-01T00:00:00Z",
        )]);
        let opts = opts(selector("app", MatchOp::Eq, "api"), "2024-01-01T00:00:00Z");

        let sources = resolve_sources(&test_client(), &cache, &opts).unwrap();
        assert!(sources.is_empty());
    }

    #[tokio::test]
    async fn test_matches_against_normalized_pod_label_keys() {
        let cache = seeded_cache(vec![running_pod(
            "api-0",
            &[("app.kubernetes.io/name", "api")],
            "2023-01-01T00:00:00Z",
        )]);
        let opts = opts(
            selector("app_kubernetes_io_name", MatchOp::Eq, "api"),
            "2024-01-01T00:00:00Z",
        );

        let sources = resolve_sources(&test_client(), &cache, &opts).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].labels().get("app_kubernetes_io_name"), Some("api"));
        assert_eq!(sources[0].labels().get("app.kubernetes.io/name"), None);
    }

    #[tokio::test]
    async fn test_skips_evicted_pods() {
        let mut pod = running_pod("api-0", &[("app", "api")], "2023-01-01T00:00:00Z");
        pod.status.as_mut().unwrap().reason = Some("Evicted".to_string());
        let cache = seeded_cache(vec![pod]);
        let opts = opts(selector("app", MatchOp::Eq, "api"), "2024-01-01T00:00:00Z");

        let sources = resolve_sources(&test_client(), &cache, &opts).unwrap();
        assert!(sources.is_empty());
    }

    #[tokio::test]
    async fn test_emits_previous_source_for_recently_restarted_container() {
        // Started after `from`: logs before the restart live in the
        // previous container.
        let cache = seeded_cache(vec![running_pod(
            "api-0",
            &[("app", "api")],
            "2024-06-01T00:00:00Z",
        )]);
        let opts = opts(selector("app", MatchOp::Eq, "api"), "2024-01-01T00:00:00Z");

        let sources = resolve_sources(&test_client(), &cache, &opts).unwrap();
        assert_eq!(sources.len(), 2);
        assert!(!sources[0].previous());
        assert!(sources[1].previous());
        assert_eq!(sources[1].labels().get("previous"), Some("true"));
        assert_eq!(sources[0].labels().get("previous"), None);
    }

    #[tokio::test]
    async fn test_emits_previous_source_when_container_not_running() {
        let mut pod = running_pod("api-0", &[("app", "api")], "2023-01-01T00:00:00Z");
        pod.status
            .as_mut()
            .unwrap()
            .container_statuses
            .as_mut()
            .unwrap()[0]
            .state = Some(ContainerState::default());
        let cache = seeded_cache(vec![pod]);
        let opts = opts(selector("app", MatchOp::Eq, "api"), "2024-01-01T00:00:00Z");

        let sources = resolve_sources(&test_client(), &cache, &opts).unwrap();
        assert_eq!(sources.len(), 2);
        assert!(sources[1].previous());
    }

    #[tokio::test]
    async fn test_includes_init_containers() {
        let mut pod = running_pod("api-0", &[("app", "api")], "2023-01-01T00:00:00Z");
        pod.spec.as_mut().unwrap().init_containers = Some(vec![Container {
            name: "migrate".to_string(),
            ..Default::default()
        }]);
        pod.status.as_mut().unwrap().init_container_statuses = Some(vec![running_status(
            "migrate",
            "2023-01-01T00:00:00Z",
        )]);
        let cache = seeded_cache(vec![pod]);
        let opts = opts(
            selector("container", MatchOp::Eq, "migrate"),
            "2024-01-01T00:00:00Z",
        );

        let sources = resolve_sources(&test_client(), &cache, &opts).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].labels().get("container"), Some("migrate"));
    }

    #[tokio::test]
    async fn test_selector_round_trip_against_pod_set() {
        let cache = seeded_cache(vec![
            running_pod("api-0", &[("app", "api")], "2023-01-01T00:00:00Z"),
            running_pod("api-1", &[("app", "api")], "2023-01-01T00:00:00Z"),
            running_pod("web-0", &[("app", "web")], "2023-01-01T00:00:00Z"),
        ]);
        let opts = opts(selector("app", MatchOp::Re, "api|web"), "2024-01-01T00:00:00Z");

        let sources = resolve_sources(&test_client(), &cache, &opts).unwrap();
        let mut pods: Vec<&str> = sources
            .iter()
            .filter_map(|s| s.labels().get("pod"))
            .collect();
        pods.sort();
        assert_eq!(pods, ["api-0", "api-1", "web-0"]);
    }
}
