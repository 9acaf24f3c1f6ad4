//! Refresh orchestration.
//!
//! `RefreshOrchestrator` owns one dashboard session: the selected scope,
//! chart settings, the per-kind fence bookkeeping and the view model. Each
//! refresh captures a token, runs its fetches (with scope fallback where it
//! applies), and commits through the fence. Everything runs on a single
//! task; session state lives in a `RefCell` that is never borrowed across
//! an await.
//!
//! Renderers read the view model through a `watch` channel: `subscribe()`
//! returns a receiver that sees every commit.

pub mod state;
pub mod view;

pub use state::{KindState, RefreshBook, RefreshOutcome, RefreshPhase};
pub use view::{
    Availability, EmptyState, FallbackAnnotation, Gauge, MapView, SensorsView, SignalState,
    StatusView, TrendsView, ViewModel,
};

use std::cell::RefCell;

use chrono::{DateTime, Utc};
use futures::future::{join_all, LocalBoxFuture};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, timeout, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::alert::severity::{alerts_for_barangay, reconcile};
use crate::alert::stalenesses::staleness_flag;
use crate::alert::thresholds::parameter_statuses;
use crate::analysis::groupings::latest_by_parameter;
use crate::config::DashboardConfig;
use crate::fence::RequestToken;
use crate::ingest::{ApplyOutcome, DashboardApi, MapPayload};
use crate::logging::{self, LogSource};
use crate::model::{DataKind, FetchError, Parameter, Reading, Scope, SeriesSet};
use crate::parameters;
use crate::scope::{fallback_chain, resolve, Resolution};
use crate::series::{align, filter, scale, ChartScaling, RangeKey, WindowSpec};

/// Requests accepted by `RefreshOrchestrator::run`.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetScope(Scope),
    SetRange(RangeKey),
    SetScaling(ChartScaling),
    Refresh(DataKind),
    RefreshAll,
    ApplyThresholds { dry_run: bool },
    Shutdown,
}

struct Session {
    scope: Scope,
    range: RangeKey,
    scaling: ChartScaling,
    book: RefreshBook,
}

/// Content computed by one refresh, applied to the view model on commit.
enum ViewUpdate {
    Sensors(Availability<SensorsView>),
    Status(Availability<StatusView>),
    Map(Availability<MapView>),
    Trends(Availability<TrendsView>),
}

impl ViewUpdate {
    fn unavailable(kind: DataKind) -> Self {
        match kind {
            DataKind::Sensors => {
                ViewUpdate::Sensors(Availability::unavailable(view::SENSORS_UNAVAILABLE))
            }
            DataKind::Alerts => {
                ViewUpdate::Status(Availability::unavailable(view::STATUS_UNAVAILABLE))
            }
            DataKind::Map => ViewUpdate::Map(Availability::unavailable(view::MAP_UNAVAILABLE)),
            DataKind::Trends => {
                ViewUpdate::Trends(Availability::unavailable(view::TRENDS_UNAVAILABLE))
            }
        }
    }

    fn apply_to(self, view: &mut ViewModel) {
        match self {
            ViewUpdate::Sensors(v) => view.sensors = v,
            ViewUpdate::Status(v) => view.status = v,
            ViewUpdate::Map(v) => view.map = v,
            ViewUpdate::Trends(v) => view.trends = v,
        }
    }
}

pub struct RefreshOrchestrator<A> {
    api: A,
    config: DashboardConfig,
    clock: fn() -> DateTime<Utc>,
    session: RefCell<Session>,
    view: watch::Sender<ViewModel>,
}

impl<A: DashboardApi> RefreshOrchestrator<A> {
    pub fn new(api: A, config: DashboardConfig) -> Self {
        let scope = config.scope;
        let (view, _) = watch::channel(ViewModel::new(scope));
        let session = Session {
            scope,
            range: config.chart.default_range,
            scaling: config.chart.scaling,
            book: RefreshBook::new(),
        };
        Self {
            api,
            config,
            clock: Utc::now,
            session: RefCell::new(session),
            view,
        }
    }

    /// Replaces the wall clock used for staleness and `last_updated`.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.view.subscribe()
    }

    pub fn snapshot(&self) -> ViewModel {
        self.view.borrow().clone()
    }

    pub fn scope(&self) -> Scope {
        self.session.borrow().scope
    }

    pub fn range(&self) -> RangeKey {
        self.session.borrow().range
    }

    pub fn scaling(&self) -> ChartScaling {
        self.session.borrow().scaling
    }

    pub fn phase(&self, kind: DataKind) -> RefreshPhase {
        self.session.borrow().book.phase(kind)
    }

    pub fn last_outcome(&self, kind: DataKind) -> Option<RefreshOutcome> {
        self.session.borrow().book.state(kind).last_outcome
    }

    // -----------------------------------------------------------------------
    // Session changes
    // -----------------------------------------------------------------------

    /// Switches scope. Every kind's token is bumped before anything else
    /// happens, so responses still in flight for the old scope are refused,
    /// and the view resets to `Pending`. Does not fetch.
    pub fn set_scope(&self, scope: Scope) {
        {
            let mut session = self.session.borrow_mut();
            session.scope = scope;
            for kind in DataKind::ALL {
                session.book.invalidate(kind);
            }
        }
        logging::info(LogSource::System, Some(&scope), "scope changed");
        self.view.send_modify(|view| {
            let last_updated = view.last_updated;
            *view = ViewModel::new(scope);
            view.last_updated = last_updated;
        });
    }

    /// Changes the chart range; invalidates trends without fetching.
    pub fn set_range(&self, range: RangeKey) {
        self.reset_trends(|session| session.range = range);
    }

    /// Changes the chart scaling; invalidates trends without fetching.
    pub fn set_scaling(&self, scaling: ChartScaling) {
        self.reset_trends(|session| session.scaling = scaling);
    }

    fn reset_trends<F: FnOnce(&mut Session)>(&self, change: F) {
        {
            let mut session = self.session.borrow_mut();
            change(&mut session);
            session.book.invalidate(DataKind::Trends);
        }
        self.view
            .send_modify(|view| view.trends = Availability::Pending);
    }

    /// `set_scope` followed by a refresh of every kind.
    pub async fn change_scope(&self, scope: Scope) -> Vec<(DataKind, RefreshOutcome)> {
        self.set_scope(scope);
        self.refresh_all().await
    }

    // -----------------------------------------------------------------------
    // Refresh entry points
    // -----------------------------------------------------------------------

    /// Explicit refresh: always issues a new request, superseding any in
    /// flight for `kind`.
    pub async fn refresh(&self, kind: DataKind) -> RefreshOutcome {
        let token = self.session.borrow_mut().book.begin(kind);
        self.run_kind(kind, token).await
    }

    /// Scheduled refresh: skipped while `kind` is already fetching.
    pub async fn tick(&self, kind: DataKind) -> RefreshOutcome {
        let token = self.session.borrow_mut().book.try_begin(kind);
        match token {
            Some(token) => self.run_kind(kind, token).await,
            None => {
                self.session.borrow_mut().book.skip(kind);
                debug!(kind = %kind, "tick skipped, fetch already in flight");
                RefreshOutcome::Skipped
            }
        }
    }

    pub async fn refresh_all(&self) -> Vec<(DataKind, RefreshOutcome)> {
        let outcomes = join_all(DataKind::ALL.map(|kind| self.refresh(kind))).await;
        DataKind::ALL.into_iter().zip(outcomes).collect()
    }

    /// Asks the server to evaluate thresholds for the current scope.
    ///
    /// 401/403 come back as `ApplyOutcome::Unauthorized` and change nothing.
    /// A real (non-dry-run) apply refreshes the status afterwards.
    pub async fn apply_thresholds(&self, dry_run: bool) -> Result<ApplyOutcome, FetchError> {
        let scope = self.scope();
        match self.api.apply_thresholds(scope, dry_run).await {
            Ok(ApplyOutcome::Unauthorized) => {
                logging::debug(
                    LogSource::Api,
                    Some(&scope),
                    "apply thresholds not permitted for this session",
                );
                Ok(ApplyOutcome::Unauthorized)
            }
            Ok(applied) => {
                logging::info(
                    LogSource::Api,
                    Some(&scope),
                    &format!("thresholds applied (dry_run={})", dry_run),
                );
                if !dry_run {
                    self.refresh(DataKind::Alerts).await;
                }
                Ok(applied)
            }
            Err(err) => {
                logging::log_fetch_failure(LogSource::Api, scope, "apply thresholds", &err);
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Run loop
    // -----------------------------------------------------------------------

    /// Drives polling and commands until `Shutdown` or the sender is dropped.
    ///
    /// Each kind ticks on its own interval (first tick immediately). Fetches
    /// run concurrently on this task; ticks for a kind that is still
    /// fetching are skipped.
    pub async fn run(&self, mut commands: mpsc::Receiver<Command>) {
        let mut sensors = self.ticker(DataKind::Sensors);
        let mut alerts = self.ticker(DataKind::Alerts);
        let mut map = self.ticker(DataKind::Map);
        let mut trends = self.ticker(DataKind::Trends);
        let mut in_flight: FuturesUnordered<LocalBoxFuture<'_, ()>> = FuturesUnordered::new();
        let ticked = move |kind| self.tick(kind).map(|_| ()).boxed_local();
        let refreshed = move |kind| self.refresh(kind).map(|_| ()).boxed_local();

        info!(scope = %self.scope(), "refresh loop started");
        loop {
            tokio::select! {
                _ = sensors.tick() => in_flight.push(ticked(DataKind::Sensors)),
                _ = alerts.tick() => in_flight.push(ticked(DataKind::Alerts)),
                _ = map.tick() => in_flight.push(ticked(DataKind::Map)),
                _ = trends.tick() => in_flight.push(ticked(DataKind::Trends)),
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    match command {
                        Command::Shutdown => break,
                        Command::SetScope(scope) => {
                            self.set_scope(scope);
                            in_flight.extend(DataKind::ALL.map(refreshed));
                        }
                        Command::SetRange(range) => {
                            self.set_range(range);
                            in_flight.push(refreshed(DataKind::Trends));
                        }
                        Command::SetScaling(scaling) => {
                            self.set_scaling(scaling);
                            in_flight.push(refreshed(DataKind::Trends));
                        }
                        Command::Refresh(kind) => in_flight.push(refreshed(kind)),
                        Command::RefreshAll => in_flight.extend(DataKind::ALL.map(refreshed)),
                        Command::ApplyThresholds { dry_run } => {
                            let apply = self.apply_thresholds(dry_run).map(|_| ());
                            in_flight.push(apply.boxed_local());
                        }
                    }
                }
                Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
            }
        }
        info!(pending = in_flight.len(), "refresh loop stopped");
    }

    fn ticker(&self, kind: DataKind) -> Interval {
        let mut ticker = interval(self.config.polling.interval(kind));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    // -----------------------------------------------------------------------
    // Per-kind work
    // -----------------------------------------------------------------------

    async fn run_kind(&self, kind: DataKind, token: RequestToken) -> RefreshOutcome {
        let (scope, range, scaling) = {
            let session = self.session.borrow();
            (session.scope, session.range, session.scaling)
        };
        debug!(kind = %kind, token = token.value(), scope = %scope, "fetching");

        let load = async {
            match kind {
                DataKind::Sensors => self.load_sensors(scope).await,
                DataKind::Alerts => self.load_status(scope).await,
                DataKind::Map => self.load_map(scope).await,
                DataKind::Trends => self.load_trends(scope, range, scaling).await,
            }
        };
        // A fetch that outlives one polling interval is abandoned so the
        // next tick for the kind is not skipped forever.
        let limit = self.config.polling.interval(kind);
        let (outcome, update) = match timeout(limit, load).await {
            Ok(loaded) => loaded,
            Err(_) => {
                logging::warn(
                    LogSource::from(kind),
                    Some(&scope),
                    &format!("{} fetch timed out after {}s", kind, limit.as_secs()),
                );
                (RefreshOutcome::Failed, ViewUpdate::unavailable(kind))
            }
        };

        let now = (self.clock)();
        let committed = self.session.borrow_mut().book.commit(kind, token, outcome, || {
            self.view.send_modify(|view| {
                update.apply_to(view);
                if outcome != RefreshOutcome::Failed {
                    view.last_updated = Some(now);
                }
            });
        });
        logging::log_transition(kind, token, scope, committed);
        committed
    }

    async fn load_sensors(&self, scope: Scope) -> (RefreshOutcome, ViewUpdate) {
        let chain = fallback_chain(scope);
        let limit = self.config.readings_limit;
        let resolution = resolve(
            &chain,
            |s| self.api.readings(s, limit),
            |readings: &Vec<Reading>| readings.is_empty(),
        )
        .await;

        let (outcome, view) = settle(
            DataKind::Sensors,
            scope,
            chain.len(),
            resolution,
            view::SENSORS_UNAVAILABLE,
            |readings, annotation| SensorsView {
                gauges: self.gauges(&readings),
                annotation,
                empty: None,
            },
            |empty| SensorsView {
                gauges: self.gauges(&[]),
                annotation: None,
                empty: Some(empty),
            },
        );
        (outcome, ViewUpdate::Sensors(view))
    }

    fn gauges(&self, readings: &[Reading]) -> Vec<Gauge> {
        let latest = latest_by_parameter(readings);
        let now = (self.clock)();
        let max_age = self.config.alerts.stale_after_minutes;

        Parameter::ALL
            .into_iter()
            .map(|parameter| {
                let reading = latest.get(&parameter);
                let timestamp = reading
                    .map(|r| r.timestamp.clone())
                    .filter(|ts| !ts.is_empty());
                Gauge {
                    parameter,
                    label: parameters::label(parameter),
                    value: reading.and_then(|r| r.value),
                    unit: parameters::unit_or_default(
                        parameter,
                        reading.map(|r| r.unit.as_str()).unwrap_or(""),
                    ),
                    stale: staleness_flag(timestamp.as_deref(), max_age, now),
                    timestamp,
                }
            })
            .collect()
    }

    /// Declared alerts and threshold severity for the selected scope only.
    async fn load_status(&self, scope: Scope) -> (RefreshOutcome, ViewUpdate) {
        let requested = parameters::threshold_request_order();
        let (alerts, thresholds) = futures::join!(
            self.api.active_alerts(scope),
            self.api.threshold_severity(scope, &requested)
        );

        if let (Err(alert_err), Err(threshold_err)) = (&alerts, &thresholds) {
            logging::log_fetch_failure(LogSource::Alerts, scope, "active alerts", alert_err);
            logging::log_fetch_failure(
                LogSource::Alerts,
                scope,
                "threshold severity",
                threshold_err,
            );
            return (RefreshOutcome::Failed, ViewUpdate::unavailable(DataKind::Alerts));
        }

        let (declared, declared_signal) = match alerts {
            Ok(alerts) => {
                let alerts = match scope.barangay_id {
                    Some(id) if self.config.alerts.prefilter_by_barangay => {
                        alerts_for_barangay(&alerts, id)
                    }
                    _ => alerts,
                };
                (alerts, SignalState::Known)
            }
            Err(err) => {
                logging::log_fetch_failure(LogSource::Alerts, scope, "active alerts", &err);
                (Vec::new(), SignalState::Unavailable { reason: err.to_string() })
            }
        };

        let (threshold, threshold_signal) = match thresholds {
            Ok(severity) => (Some(severity), SignalState::Known),
            Err(err) => {
                logging::log_fetch_failure(LogSource::Alerts, scope, "threshold severity", &err);
                (None, SignalState::Unavailable { reason: err.to_string() })
            }
        };

        let combined = reconcile(&declared, threshold.as_ref());
        let parameters = threshold.as_ref().map(parameter_statuses).unwrap_or_default();
        let outcome = if declared.is_empty() && parameters.is_empty() {
            RefreshOutcome::CommittedEmpty
        } else {
            RefreshOutcome::Committed
        };

        let status = StatusView {
            combined,
            parameters,
            alerts: declared,
            declared_signal,
            threshold_signal,
        };
        (outcome, ViewUpdate::Status(Availability::Ready(status)))
    }

    async fn load_map(&self, scope: Scope) -> (RefreshOutcome, ViewUpdate) {
        let chain = fallback_chain(scope);
        let resolution = resolve(
            &chain,
            |s| self.api.map_data(s),
            |payload: &MapPayload| payload.is_empty(),
        )
        .await;

        let (outcome, view) = settle(
            DataKind::Map,
            scope,
            chain.len(),
            resolution,
            view::MAP_UNAVAILABLE,
            |payload, annotation| MapView {
                payload,
                annotation,
                empty: None,
            },
            |empty| MapView {
                payload: MapPayload::default(),
                annotation: None,
                empty: Some(empty),
            },
        );
        (outcome, ViewUpdate::Map(view))
    }

    async fn load_trends(
        &self,
        scope: Scope,
        range: RangeKey,
        scaling: ChartScaling,
    ) -> (RefreshOutcome, ViewUpdate) {
        let chain = fallback_chain(scope);
        let window = range.window(self.config.chart.latest_points);
        let resolution = resolve(
            &chain,
            |s| self.fetch_chart_set(s, window),
            |set: &SeriesSet| set.is_empty(),
        )
        .await;

        let (outcome, view) = settle(
            DataKind::Trends,
            scope,
            chain.len(),
            resolution,
            view::TRENDS_UNAVAILABLE,
            |aligned, annotation| TrendsView {
                range,
                scaling,
                chart: scale(&filter(&aligned, range), scaling),
                annotation,
                empty: None,
            },
            |empty| TrendsView {
                range,
                scaling,
                chart: SeriesSet::empty(),
                annotation: None,
                empty: Some(empty),
            },
        );
        (outcome, ViewUpdate::Trends(view))
    }

    /// Fetches every parameter's series for one scope and aligns them.
    ///
    /// A parameter whose fetch fails is left out of the set; the scope only
    /// fails when every parameter failed.
    async fn fetch_chart_set(
        &self,
        scope: Scope,
        window: WindowSpec,
    ) -> Result<SeriesSet, FetchError> {
        let results = join_all(
            Parameter::ALL.map(|parameter| self.api.chart_series(scope, parameter, window)),
        )
        .await;

        let mut inputs = Vec::new();
        let mut first_error = None;
        for (parameter, result) in Parameter::ALL.into_iter().zip(results) {
            match result {
                Ok(payload) => inputs.push(payload.into_input(parameter)),
                Err(err) => {
                    debug!(
                        parameter = %parameter, scope = %scope, error = %err,
                        "chart series fetch failed"
                    );
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) if inputs.is_empty() => Err(err),
            _ => Ok(align(&inputs)),
        }
    }
}

/// Turns a resolution into the kind's outcome and view content.
///
/// - found → `Committed`, built by `ready`, annotated when a broader scope
///   answered
/// - every scope failed → `Failed`, `Unavailable(reason)`
/// - otherwise → `CommittedEmpty`, the explicit empty state built by `empty`
fn settle<T, V>(
    kind: DataKind,
    requested: Scope,
    chain_len: usize,
    resolution: Resolution<T>,
    reason: &str,
    ready: impl FnOnce(T, Option<FallbackAnnotation>) -> V,
    empty: impl FnOnce(EmptyState) -> V,
) -> (RefreshOutcome, Availability<V>) {
    logging::log_resolution_summary(kind, requested, resolution.attempts());

    if resolution.all_failed() {
        return (RefreshOutcome::Failed, Availability::unavailable(reason));
    }
    match resolution {
        Resolution::Found(found) => {
            let annotation = found.was_fallback.then_some(FallbackAnnotation {
                requested,
                used: found.scope_used,
            });
            (
                RefreshOutcome::Committed,
                Availability::Ready(ready(found.result, annotation)),
            )
        }
        Resolution::Exhausted { .. } => (
            RefreshOutcome::CommittedEmpty,
            Availability::Ready(empty(EmptyState::for_chain_len(chain_len))),
        ),
    }
}
