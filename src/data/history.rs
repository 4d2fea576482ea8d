use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::data::file_store;
use crate::data::store::MetricStore;
use crate::state::metric_series::MetricPoint;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one outstanding metric-history fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn next() -> Self {
        RequestId(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// A fetch the panel wants issued. The panel only decides *what* to fetch;
/// the app owns the I/O and executes these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub request_id: RequestId,
    pub run_uuid: String,
    pub metric_key: String,
}

/// The (run, metric) pairs worth fetching: those with a known latest value.
/// A run that never logged the metric has no history to load.
pub fn pairs_to_fetch(
    store: &MetricStore,
    run_uuids: &[String],
    metric_keys: &[String],
) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for run_uuid in run_uuids {
        for metric_key in metric_keys {
            if store.latest_value(run_uuid, metric_key).is_some() {
                pairs.push((run_uuid.clone(), metric_key.clone()));
            }
        }
    }
    pairs
}

/// An in-flight history fetch. The reader thread fills `result`; the app
/// polls it each frame. Dropping the pending entry simply orphans the
/// slot -- a late completion writes into an `Arc` nobody reads.
pub struct PendingHistoryFetch {
    pub request_id: RequestId,
    pub run_uuid: String,
    pub metric_key: String,
    pub result: Arc<Mutex<Option<Result<Vec<MetricPoint>, String>>>>,
}

/// Issue a fetch on a background thread so the UI stays responsive.
pub fn spawn_history_fetch(
    root: PathBuf,
    experiment_id: String,
    request: FetchRequest,
) -> PendingHistoryFetch {
    let result: Arc<Mutex<Option<Result<Vec<MetricPoint>, String>>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&result);
    let FetchRequest { request_id, run_uuid, metric_key } = request;

    tracing::info!("[{request_id}] Fetching history for {run_uuid}/{metric_key}");
    {
        let run_uuid = run_uuid.clone();
        let metric_key = metric_key.clone();
        std::thread::spawn(move || {
            let loaded =
                file_store::read_metric_history(&root, &experiment_id, &run_uuid, &metric_key);
            *slot.lock().unwrap() = Some(loaded);
        });
    }

    PendingHistoryFetch { request_id, run_uuid, metric_key, result }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn request_ids_are_unique() {
        let a = RequestId::next();
        let b = RequestId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn pairs_to_fetch_skips_runs_without_a_latest_value() {
        let mut store = MetricStore::new();
        store.register_run(
            "run-a".to_string(),
            "alpha".to_string(),
            BTreeMap::from([("loss".to_string(), 0.2)]),
        );
        store.register_run("run-b".to_string(), "beta".to_string(), BTreeMap::new());

        let runs = vec!["run-a".to_string(), "run-b".to_string()];
        let keys = vec!["loss".to_string(), "acc".to_string()];
        let pairs = pairs_to_fetch(&store, &runs, &keys);
        assert_eq!(pairs, vec![("run-a".to_string(), "loss".to_string())]);
    }
}
