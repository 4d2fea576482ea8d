//! Route strings and their query parameters.
//!
//! The metric page encodes its state in the query string the same way the
//! web UI does: `runs` and `plot_metric_keys` carry JSON-encoded arrays,
//! `experiment` a plain id. All parsers are total -- missing or malformed
//! parameters fall back to "no prior selection" / "not comparing".

/// Route history for the app. Stands in for browser navigation: pushing a
/// route is the outbound `navigate(..)` call of the panel.
#[derive(Debug, Clone)]
pub struct Navigator {
    history: Vec<String>,
}

impl Navigator {
    pub fn new(initial_route: String) -> Self {
        Self { history: vec![initial_route] }
    }

    pub fn current(&self) -> &str {
        self.history.last().map(String::as_str).unwrap_or("")
    }

    /// Query-string portion of the current route, including the `?`.
    pub fn search(&self) -> &str {
        let current = self.current();
        match current.find('?') {
            Some(idx) => &current[idx..],
            None => "",
        }
    }

    pub fn push(&mut self, route: String) {
        tracing::info!("Navigating to {route}");
        self.history.push(route);
    }
}

/// Route of the metric page for a set of runs and selected metric keys.
pub fn metric_page_route(
    run_uuids: &[String],
    metric_key: &str,
    experiment_id: Option<&str>,
    selected_metric_keys: &[String],
) -> String {
    let runs = serde_json::to_string(run_uuids).unwrap_or_else(|_| "[]".to_string());
    let keys = serde_json::to_string(selected_metric_keys).unwrap_or_else(|_| "[]".to_string());
    let mut route = format!("/metric/{metric_key}?runs={runs}");
    if let Some(experiment_id) = experiment_id {
        route.push_str(&format!("&experiment={experiment_id}"));
    }
    route.push_str(&format!("&plot_metric_keys={keys}"));
    route
}

/// Route of a single run's detail page, used by the popover links.
pub fn run_page_route(experiment_id: Option<&str>, run_uuid: &str) -> String {
    format!("/experiments/{}/runs/{run_uuid}", experiment_id.unwrap_or("0"))
}

/// Look up a raw query parameter. Accepts a leading `?` on both the search
/// string and the first parameter name.
pub fn query_param<'a>(search: &'a str, name: &str) -> Option<&'a str> {
    let search = search.trim_start_matches('?');
    for pair in search.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if key.trim_start_matches('?') == name {
            return Some(value);
        }
    }
    None
}

/// Metric keys previously selected on the plot, restored on mount.
/// Missing or malformed parameters mean "no prior selection".
pub fn plot_metric_keys_from_query(search: &str) -> Vec<String> {
    query_param(search, "plot_metric_keys")
        .and_then(|v| serde_json::from_str(v).ok())
        .unwrap_or_default()
}

pub fn experiment_id_from_query(search: &str) -> Option<String> {
    query_param(search, "experiment").map(String::from)
}

/// Whether the page shows more than one run. True iff the `runs` parameter
/// parses as a JSON array of length > 1; anything else is "not comparing".
pub fn is_comparing(search: &str) -> bool {
    query_param(search, "runs")
        .and_then(|v| serde_json::from_str::<Vec<String>>(v).ok())
        .map(|runs| runs.len() > 1)
        .unwrap_or(false)
}
