//! Load test plans and the scenario runner.
//!
//! A worker runs every step of the plan's `Scenario` in order, `TestIteration`
//! times, against its own variable set. Each step's URL, body and variable rules are
//! rendered from the current variables right before use, and values extracted from
//! a response are folded back in so later steps see them.
//!
//! Failures never stop a worker. A connection error, an error status, a template
//! that fails to render or a variable that can't be extracted is recorded as a
//! [`StepError`] and the worker moves on; the collected errors are reported when the
//! worker finishes.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::extract::{self, VariableRules};
use crate::oauth::{AuthorizedDispatch, RequestMethod};
use crate::template::{Renderer, Variables};
use crate::util;
use crate::GanderError;

/// A load test plan, as read from the `--test-case` file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadTestPlan {
    /// How many times each worker runs the whole scenario.
    #[serde(deserialize_with = "util::deserialize_count")]
    pub test_iteration: usize,
    /// One worker is started per record; the record seeds its variables.
    pub test_data: Vec<Map<String, Value>>,
    pub scenario: Vec<ScenarioStep>,
}
impl LoadTestPlan {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<LoadTestPlan, GanderError> {
        let contents = std::fs::read_to_string(path)?;
        contents.parse()
    }

    fn validate(&self) -> Result<(), GanderError> {
        if self.scenario.is_empty() {
            return Err(GanderError::InvalidTestPlan {
                detail: "`Scenario` has no steps".to_string(),
            });
        }
        for step in &self.scenario {
            if let Some(method) = &step.method {
                RequestMethod::from_str(method).map_err(|e| GanderError::InvalidTestPlan {
                    detail: format!("step `{}`: {}", step.name, e),
                })?;
            }
            if let Some(rules) = &step.variables {
                if !rules.is_object() {
                    return Err(GanderError::InvalidTestPlan {
                        detail: format!("step `{}`: `variables` must be an object", step.name),
                    });
                }
            }
        }
        Ok(())
    }
}
impl FromStr for LoadTestPlan {
    type Err = GanderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let plan: LoadTestPlan =
            serde_json::from_str(s).map_err(|e| GanderError::InvalidTestPlan {
                detail: e.to_string(),
            })?;
        plan.validate()?;
        Ok(plan)
    }
}

fn deserialize_delay<'de, D>(deserializer: D) -> Result<Option<chrono::Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    util::deserialize_seconds(deserializer).map(Some)
}

/// One templated request in a scenario.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStep {
    pub name: String,
    /// URL template.
    pub url: String,
    /// Defaults to `POST` when the step has `data`, `GET` otherwise.
    #[serde(default)]
    pub method: Option<String>,
    /// JSON body template.
    #[serde(default)]
    pub data: Option<Value>,
    /// Extraction rules template, keyed by variable name.
    #[serde(default)]
    pub variables: Option<Value>,
    /// Pause after this step, in seconds.
    #[serde(default, deserialize_with = "deserialize_delay")]
    pub delay_to_next: Option<chrono::Duration>,
}

/// One failure recorded while running a scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct StepError {
    /// 0-based iteration the failure happened in.
    pub iteration: usize,
    pub step: String,
    /// Absent when no response was received.
    pub status: Option<u16>,
    /// The response body, or a description of the failure.
    pub message: String,
}
impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let status = match self.status {
            Some(code) => util::color_status_code(code),
            None => "-".to_string(),
        };
        write!(
            f,
            "iteration: {} | step: {} | status: {}\n {}",
            self.iteration, self.step, status, self.message
        )
    }
}

/// What one worker did.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub label: String,
    /// Requests that received a response.
    pub requests: usize,
    pub errors: Vec<StepError>,
    /// The variable set as the worker left it.
    pub variables: Variables,
}
impl ScenarioReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Logging context owned by one worker: every line it writes carries its label.
#[derive(Debug, Clone)]
pub struct WorkerLog {
    label: String,
}
impl WorkerLog {
    /// `worker <index>`, or `worker <index> <name>` when the record has a `name`.
    pub fn new(index: usize, record: &Variables) -> Self {
        let label = match record.get("name") {
            Some(Value::String(name)) => format!("worker {} {}", index, name),
            Some(Value::Null) | None => format!("worker {}", index),
            Some(other) => format!("worker {} {}", index, other),
        };
        WorkerLog { label }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn info<T: fmt::Display>(&self, message: T) {
        info!("{} {}", self.label, message);
    }

    pub fn debug<T: fmt::Display>(&self, message: T) {
        debug!("{} {}", self.label, message);
    }

    pub fn error<T: fmt::Display>(&self, message: T) {
        error!("{} {}", self.label, message);
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The variable set as a one-row table, `updated` entries in yellow.
pub fn variable_table(variables: &Variables, updated: &BTreeSet<String>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(variables.keys().map(Cell::new).collect::<Vec<_>>());
    table.add_row(
        variables
            .iter()
            .map(|(name, value)| {
                let cell = Cell::new(display_value(value));
                if updated.contains(name) {
                    cell.fg(Color::Yellow)
                } else {
                    cell
                }
            })
            .collect::<Vec<_>>(),
    );
    table
}

// Everything a step needs once its templates are rendered.
struct RenderedStep {
    url: String,
    body: Option<Value>,
}

fn render_step(
    renderer: &Renderer,
    step: &ScenarioStep,
    variables: &Variables,
) -> Result<RenderedStep, GanderError> {
    let url = renderer.render(&step.url, variables)?;
    let body = match &step.data {
        Some(data) => Some(renderer.render_json(data, variables)?),
        None => None,
    };
    Ok(RenderedStep { url, body })
}

/// Run `steps` `iterations` times, starting from `variables`.
pub async fn run_scenario<D>(
    dispatch: &mut D,
    mut variables: Variables,
    steps: &[ScenarioStep],
    iterations: usize,
    log: &WorkerLog,
) -> ScenarioReport
where
    D: AuthorizedDispatch + ?Sized,
{
    let renderer = Renderer::new();
    let mut errors = Vec::new();
    let mut requests = 0;

    for iteration in 0..iterations {
        log.info(format!("Iteration:{} Start", iteration));
        for step in steps {
            let method = step.method.as_deref();
            let mut record = |status: Option<u16>, message: String| {
                errors.push(StepError {
                    iteration,
                    step: step.name.clone(),
                    status,
                    message,
                })
            };

            let rendered = match render_step(&renderer, step, &variables) {
                Ok(rendered) => Some(rendered),
                Err(e) => {
                    log.error(format!("<{}> {}", step.name, e));
                    record(None, e.to_string());
                    None
                }
            };

            if let Some(rendered) = rendered {
                log.info(format!(
                    "<{}>\tRequesting: {}, method={}",
                    step.name,
                    rendered.url,
                    method.unwrap_or_else(|| match rendered.body {
                        Some(_) => "POST",
                        None => "GET",
                    })
                ));
                if let Some(body) = &rendered.body {
                    log.debug(format!("Data: {}", body));
                }

                match dispatch
                    .authorized_request(&rendered.url, method, rendered.body.as_ref())
                    .await
                {
                    Err(e) => {
                        log.error(format!("<{}> request failed: {}", step.name, e));
                        record(None, e.to_string());
                    }
                    Ok(response) => {
                        requests += 1;
                        log.info(format!(
                            "Status: {}",
                            util::color_status_code(response.status)
                        ));
                        log.debug(format!("Result: {}", response.body));
                        if (200..400).contains(&response.status) {
                            if let (Some(rules), false) = (&step.variables, response.body.is_empty())
                            {
                                let updated = apply_rules(
                                    &renderer,
                                    rules,
                                    &response.body,
                                    &mut variables,
                                    &mut record,
                                );
                                if !updated.is_empty() {
                                    log.info(format!(
                                        "---Variables---\n{}",
                                        variable_table(&variables, &updated)
                                    ));
                                }
                            }
                        } else {
                            record(Some(response.status), response.body);
                        }
                    }
                }
            }

            if let Some(delay) = step.delay_to_next {
                if let Ok(delay) = delay.to_std() {
                    log.info(format!("Sleeping {:.3} seconds...", delay.as_secs_f64()));
                    tokio::time::sleep(delay).await;
                }
            }
        }
        log.info(format!("Iteration:{} End", iteration));
    }

    if !errors.is_empty() {
        log.error(format!("{} Error Occurred", errors.len()));
        for entry in &errors {
            log.error(entry);
        }
    }

    ScenarioReport {
        label: log.label().to_string(),
        requests,
        errors,
        variables,
    }
}

// Render and apply a step's rules, returning the names of the variables that changed.
fn apply_rules<F>(
    renderer: &Renderer,
    rules: &Value,
    body: &str,
    variables: &mut Variables,
    record: &mut F,
) -> BTreeSet<String>
where
    F: FnMut(Option<u16>, String),
{
    let mut updated = BTreeSet::new();
    let rules: VariableRules = match renderer
        .render_json(rules, variables)
        .and_then(|rendered| serde_json::from_value(rendered).map_err(GanderError::from))
    {
        Ok(rules) => rules,
        Err(e) => {
            record(None, format!("invalid variable rules: {}", e));
            return updated;
        }
    };
    let response: Value = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            record(
                None,
                format!("response is not JSON, nothing extracted: {}", e),
            );
            return updated;
        }
    };
    let extraction = extract::extract_variables(&rules, &response);
    for e in extraction.errors {
        record(None, e.to_string());
    }
    for (name, value) in extraction.values {
        updated.insert(name.clone());
        variables.insert(name, value);
    }
    updated
}
