//! Per-target long-running crawl loop (spec §4.5): fetch → observe → log →
//! score → (optionally) consult advisor → (optionally) mutate DNA → delay →
//! repeat. One `tokio::task` per session, matching `rlm-core::orchestrator`'s
//! "the orchestrator returns a stream of events the caller observes"
//! shape, generalized from a single request/response exchange to a
//! long-running per-target loop.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use rand::Rng;
use reqwest::Client;
use tokio::sync::{mpsc, watch};
use tokio::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::advisor::{AdvisorBridge, ChallengeInfo, Context as AdvisorContext, LastRequestView, LearningEventSummary, Observation, ObservationKind};
use crate::config::EngineConfig;
use crate::crawl::challenge;
use crate::crawl::events::{CrawlEvent, CrawlEventType};
use crate::crawl::goal;
use crate::crawl::http;
use crate::crawl::session::{CrawlSession, SessionRegistryEntry};
use crate::crawl::types::{CrawlMode, CrawlRequest, SessionControl, SessionStatus, StopReason};
use crate::dna::mutator::{GeneMutation, MutationSeverity, Mutator};
use crate::dna::{Dna, Gene};
use crate::error::{Error, Result};
use crate::ids::{SessionId, TargetId};
use crate::scorer::{NavigationRecommendation, Scorer};
use crate::store::{
    DnaSnapshot, GreenLightStatus, LearningEvent, LearningEventType, RequestLog,
    RequestLogResponse, Store, Target, TargetPatch, TargetStatus,
};

/// Fixed path list an `explore`-mode session cycles through once it is
/// clear to navigate (spec §4.5 step 7).
const EXPLORE_PATHS: &[&str] = &["/", "/blog", "/about", "/contact"];

/// Max body bytes kept in a `RequestLog`'s response preview (spec §3:
/// "truncated").
const BODY_PREVIEW_LIMIT: usize = 2_000;

/// Store-write failures within this window trip the `>3 in 30s` fail-fast
/// rule in spec §7.
const STORE_FAILURE_WINDOW_SECS: i64 = 30;
const STORE_FAILURE_LIMIT: usize = 3;

/// Owns the shared collaborators every session needs and tracks which
/// targets currently have a running session (spec §4.5: "at most one
/// active session per target").
pub struct CrawlEngine {
    store: Arc<dyn Store>,
    mutator: Arc<Mutator>,
    advisor: Arc<AdvisorBridge>,
    http: Client,
    config: EngineConfig,
    sessions: Arc<Mutex<HashMap<SessionId, SessionRegistryEntry>>>,
    active_targets: Arc<Mutex<HashSet<TargetId>>>,
}

impl CrawlEngine {
    pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Result<Self> {
        let http = http::build_http_client(&config)?;
        let mutator = Arc::new(Mutator::new(store.clone()));
        let advisor = Arc::new(AdvisorBridge::new(config.advisor.clone()));
        Ok(Self {
            store,
            mutator,
            advisor,
            http,
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            active_targets: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// `Start(request) -> session` (spec §4.5). Fails with `AlreadyRunning`
    /// if a session is already active for this target.
    pub fn start(&self, request: CrawlRequest) -> Result<CrawlSession> {
        let target_id = request.target_id;
        {
            let mut active = self.active_targets.lock().expect("active_targets lock poisoned");
            if !active.insert(target_id) {
                return Err(Error::already_running(target_id.to_string()));
            }
        }

        let session_id = SessionId::new();
        let (control_tx, control_rx) = watch::channel(SessionControl::Run);
        let (status_tx, status_rx) = watch::channel(SessionStatus::Starting);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        self.sessions.lock().expect("sessions lock poisoned").insert(
            session_id,
            SessionRegistryEntry {
                target_id,
                control: control_tx,
                status: status_rx,
            },
        );

        let ctx = RunContext {
            store: self.store.clone(),
            mutator: self.mutator.clone(),
            advisor: self.advisor.clone(),
            http: self.http.clone(),
            config: self.config.clone(),
            session_id,
            events: events_tx,
        };
        let active_targets = self.active_targets.clone();

        tokio::spawn(async move {
            run_session(ctx, request, control_rx, status_tx).await;
            active_targets.lock().expect("active_targets lock poisoned").remove(&target_id);
        });

        Ok(CrawlSession {
            id: session_id,
            target_id,
            events: events_rx,
        })
    }

    pub fn pause(&self, session_id: SessionId) -> Result<()> {
        self.signal(session_id, SessionControl::Pause)
    }

    pub fn resume(&self, session_id: SessionId) -> Result<()> {
        self.signal(session_id, SessionControl::Run)
    }

    pub fn stop(&self, session_id: SessionId) -> Result<()> {
        self.signal(session_id, SessionControl::Stop)
    }

    pub fn status(&self, session_id: SessionId) -> Option<SessionStatus> {
        let sessions = self.sessions.lock().expect("sessions lock poisoned");
        sessions.get(&session_id).map(|entry| *entry.status.borrow())
    }

    fn signal(&self, session_id: SessionId, control: SessionControl) -> Result<()> {
        let sessions = self.sessions.lock().expect("sessions lock poisoned");
        let entry = sessions
            .get(&session_id)
            .ok_or_else(|| Error::invariant_violation(format!("no session {session_id}")))?;
        let _ = entry.control.send(control);
        Ok(())
    }
}

/// Collaborators `run_session` and its helpers share. Bundled to avoid a
/// seven-parameter function signature threaded through every helper.
struct RunContext {
    store: Arc<dyn Store>,
    mutator: Arc<Mutator>,
    advisor: Arc<AdvisorBridge>,
    http: Client,
    config: EngineConfig,
    session_id: SessionId,
    events: mpsc::UnboundedSender<CrawlEvent>,
}

impl RunContext {
    fn emit(&self, event_type: CrawlEventType, target_id: TargetId, content: impl Into<String>) {
        let _ = self.events.send(CrawlEvent::new(event_type, self.session_id, target_id, content));
    }
}

/// Outcome of issuing and observing one outbound request.
struct Observed {
    response_status: Option<u16>,
    body: String,
    url: String,
    challenge_detected: bool,
    challenge_type: Option<String>,
}

#[instrument(skip(ctx, request, control_rx, status_tx), fields(target_id = %request.target_id, mode = ?request.mode))]
async fn run_session(
    ctx: RunContext,
    request: CrawlRequest,
    mut control_rx: watch::Receiver<SessionControl>,
    status_tx: watch::Sender<SessionStatus>,
) {
    let target_id = request.target_id;
    info!("crawl session starting");
    let _ = status_tx.send(SessionStatus::Running);

    let started = Instant::now();
    let mut iteration: u64 = 0;
    let mut store_failures: Vec<Instant> = Vec::new();
    let mut seen_any_request = !ctx.store.recent_request_logs(target_id, 1).unwrap_or_default().is_empty();

    let stop_reason = 'session: loop {
        match wait_for_runnable(&mut control_rx, &status_tx).await {
            None => break 'session StopReason::Stopped,
            Some(()) => {}
        }

        if let Some(max_iterations) = request.max_iterations {
            if iteration >= max_iterations {
                break 'session StopReason::MaxIterationsReached;
            }
        }
        if let Some(max_duration_secs) = request.max_duration_secs {
            if started.elapsed().as_secs() >= max_duration_secs {
                break 'session StopReason::MaxDurationElapsed;
            }
        }

        iteration += 1;
        ctx.emit(CrawlEventType::IterationStart, target_id, format!("iteration {iteration}"));

        let target = match ctx.store.get_target(target_id) {
            Ok(Some(t)) => t,
            Ok(None) => break 'session StopReason::Failed,
            Err(e) => {
                record_store_failure(&mut store_failures);
                if too_many_store_failures(&store_failures) {
                    fail_session(&ctx, target_id, &format!("repeated store failures: {e}"));
                    break 'session StopReason::Failed;
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
                continue 'session;
            }
        };

        let dna_snapshot = match ensure_active_dna(&ctx, target_id) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                fail_session(&ctx, target_id, &format!("no active DNA: {e}"));
                break 'session StopReason::Failed;
            }
        };

        let pre_iteration_navigation = NavigationRecommendation::for_status(target.green_light_status);
        let url = select_url(&request, &dna_snapshot.dna, iteration, pre_iteration_navigation.can_navigate);
        let observed = match issue_and_log(&ctx, target_id, &dna_snapshot, &url).await {
            Ok(observed) => observed,
            Err(e) => {
                record_store_failure(&mut store_failures);
                if too_many_store_failures(&store_failures) {
                    fail_session(&ctx, target_id, &format!("repeated store failures: {e}"));
                    break 'session StopReason::Failed;
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
                continue 'session;
            }
        };

        if !seen_any_request && observed.response_status == Some(200) {
            let event = LearningEvent::new(
                target_id,
                LearningEventType::Milestone,
                "First successful request",
                "Target responded with a clean 200 on the first crawl iteration.",
                10,
            );
            if let Err(e) = ctx.store.append_learning_event(&event) {
                record_store_failure(&mut store_failures);
                if too_many_store_failures(&store_failures) {
                    fail_session(&ctx, target_id, &format!("repeated store failures: {e}"));
                    break 'session StopReason::Failed;
                }
            }
        }
        seen_any_request = true;

        if observed.challenge_detected {
            warn!(challenge_type = ?observed.challenge_type, "challenge detected");
            ctx.emit(
                CrawlEventType::ChallengeDetected,
                target_id,
                observed.challenge_type.clone().unwrap_or_default(),
            );
            if widen_delay_locally(&ctx, target_id, &dna_snapshot, observed.challenge_type.as_deref()) {
                record_store_failure(&mut store_failures);
                if too_many_store_failures(&store_failures) {
                    fail_session(&ctx, target_id, "repeated store failures widening delay after challenge");
                    break 'session StopReason::Failed;
                }
            }
        }

        let recent = ctx.store.recent_request_logs(target_id, 20).unwrap_or_default();
        // Re-fetch the DNA: the local-adaptation widen above may have
        // produced a new active snapshot, and the Scorer should see it.
        let scoring_dna = ctx.store.get_active_dna(target_id).ok().flatten().unwrap_or(dna_snapshot.clone());

        let green_light = Scorer::calculate(&target, &scoring_dna.dna, &recent);
        if let Err(e) = ctx.store.put_green_light_state(&green_light) {
            record_store_failure(&mut store_failures);
            if too_many_store_failures(&store_failures) {
                fail_session(&ctx, target_id, &format!("repeated store failures: {e}"));
                break 'session StopReason::Failed;
            }
        }

        ctx.emit(CrawlEventType::ScoreUpdated, target_id, format!("trust_score={}", green_light.trust_score));
        if green_light.status != target.green_light_status {
            ctx.emit(
                CrawlEventType::StateTransition,
                target_id,
                format!("{:?} -> {:?}", target.green_light_status, green_light.status),
            );
        }

        let new_status = next_target_status(target.status, green_light.status);
        let patch = TargetPatch {
            status: Some(new_status),
            green_light_status: Some(green_light.status),
            trust_score: Some(green_light.trust_score),
            established_at: Some(green_light.established_at),
            maintained_for: Some(green_light.maintained_for),
            last_seen: Some(Some(Utc::now())),
            ..Default::default()
        };
        if ctx.store.update_target_fields(target_id, patch).is_err() {
            record_store_failure(&mut store_failures);
            if too_many_store_failures(&store_failures) {
                fail_session(&ctx, target_id, "repeated store failures updating target");
                break 'session StopReason::Failed;
            }
        }

        if request.mode == CrawlMode::Achieve {
            if let Some(goal) = &request.goal {
                if goal::goal_achieved(goal, &observed.url, &observed.body) {
                    let event = LearningEvent::new(
                        target_id,
                        LearningEventType::Milestone,
                        "Goal achieved",
                        format!("goal '{goal}' matched on {}", observed.url),
                        20,
                    );
                    if let Err(e) = ctx.store.append_learning_event(&event) {
                        record_store_failure(&mut store_failures);
                        if too_many_store_failures(&store_failures) {
                            fail_session(&ctx, target_id, &format!("repeated store failures: {e}"));
                            break 'session StopReason::Failed;
                        }
                    }
                    ctx.emit(CrawlEventType::GoalAchieved, target_id, goal.clone());
                    break 'session StopReason::GoalAchieved;
                }
            }
        }

        let navigation = NavigationRecommendation::for_status(green_light.status);
        if !navigation.can_navigate {
            let mutated_dna = consult_advisor_and_mutate(&ctx, target_id, &scoring_dna, green_light.trust_score, &recent).await;
            let delay_dna = mutated_dna.unwrap_or(scoring_dna);
            let sleep_ms = 2 * delay_dna.dna.timing.delay_range_ms.max;
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        } else {
            let delay_ms = {
                let range = &scoring_dna.dna.timing.delay_range_ms;
                if range.max > range.min {
                    rand::thread_rng().gen_range(range.min..=range.max)
                } else {
                    range.min
                }
            };
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    };

    let final_status = match stop_reason {
        StopReason::Failed => SessionStatus::Failed,
        _ => SessionStatus::Completed,
    };
    if matches!(stop_reason, StopReason::Failed) {
        let event = LearningEvent::new(
            target_id,
            LearningEventType::Other,
            "Session failed",
            "The crawl session terminated due to an unrecoverable error.",
            0,
        );
        if let Err(e) = ctx.store.append_learning_event(&event) {
            warn!(error = %e, "failed to persist session-failed learning event");
        }
        if let Err(e) = ctx.store.update_target_fields(
            target_id,
            TargetPatch {
                status: Some(TargetStatus::Failed),
                ..Default::default()
            },
        ) {
            warn!(error = %e, "failed to persist target status after session failure");
        }
    }
    info!(?stop_reason, iterations = iteration, "crawl session ended");
    ctx.emit(CrawlEventType::SessionEnded, target_id, format!("{stop_reason:?}"));
    let _ = status_tx.send(final_status);
}

/// Blocks until the session should run its next iteration, handling the
/// `Pause`/`Resume`/`Stop` cooperative-cancel protocol (spec §5). Returns
/// `None` when the session should stop.
async fn wait_for_runnable(
    control_rx: &mut watch::Receiver<SessionControl>,
    status_tx: &watch::Sender<SessionStatus>,
) -> Option<()> {
    loop {
        match *control_rx.borrow() {
            SessionControl::Stop => return None,
            SessionControl::Run => return Some(()),
            SessionControl::Pause => {
                let _ = status_tx.send(SessionStatus::Paused);
            }
        }
        if control_rx.changed().await.is_err() {
            return None;
        }
        if *control_rx.borrow() == SessionControl::Run {
            let _ = status_tx.send(SessionStatus::Running);
        }
    }
}

fn ensure_active_dna(ctx: &RunContext, target_id: TargetId) -> Result<DnaSnapshot> {
    if let Some(active) = ctx.store.get_active_dna(target_id)? {
        return Ok(active);
    }
    ctx.mutator.create_initial(target_id)
}

/// Picks the next URL to fetch. Only cycles through `EXPLORE_PATHS` when
/// navigation is allowed for the target's current trust status (spec §4.3:
/// RED means "no navigation, analyze only") — otherwise every iteration
/// re-fetches the seed URL, matching the single "exploratory sub-request"
/// spec §4.5 step 7 allows when `canNavigate=false`.
fn select_url(request: &CrawlRequest, dna: &Dna, iteration: u64, can_navigate: bool) -> String {
    if iteration == 1 || !can_navigate {
        return request.seed_url.clone();
    }
    let _ = dna;
    let path = EXPLORE_PATHS[(iteration as usize - 1) % EXPLORE_PATHS.len()];
    join_url(&request.seed_url, path)
}

fn join_url(base: &str, path: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    format!("{trimmed}{path}")
}

#[instrument(skip(ctx, dna_snapshot), fields(target_id = %target_id, url = %url))]
async fn issue_and_log(
    ctx: &RunContext,
    target_id: TargetId,
    dna_snapshot: &DnaSnapshot,
    url: &str,
) -> Result<Observed> {
    let (header_map, ordered_pairs) = http::ordered_headers(&dna_snapshot.dna);
    let request_headers = http::request_headers_json(&dna_snapshot.dna, &ordered_pairs);

    let log = RequestLog::new(target_id, dna_snapshot.id, "GET", url, request_headers);
    ctx.store.append_request_log(&log)?;
    ctx.emit(CrawlEventType::RequestSent, target_id, url.to_string());

    let started = Instant::now();
    let send_result = tokio::time::timeout(
        Duration::from_millis(ctx.config.request_timeout_ms),
        ctx.http.get(url).headers(header_map).send(),
    )
    .await;

    let response_update;
    let observed;

    match send_result {
        Ok(Ok(response)) => {
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            let response_headers = headers_to_json(response.headers());
            let body = response.text().await.unwrap_or_default();
            let timing_ms = started.elapsed().as_millis() as u64;

            let challenge_detected = challenge::detect_challenge(status, &content_type, &body);
            let challenge_type = challenge_detected.then(|| challenge::classify_challenge_type(&body).to_string());
            let was_blocked = matches!(status, 403 | 429) || challenge_detected;
            let block_reason = was_blocked.then(|| {
                if challenge_detected {
                    format!("challenge: {}", challenge_type.clone().unwrap_or_default())
                } else {
                    format!("status {status}")
                }
            });

            response_update = RequestLogResponse {
                response_status: Some(status),
                response_headers: Some(response_headers),
                response_body_preview: Some(truncate(&body, BODY_PREVIEW_LIMIT)),
                was_blocked,
                block_reason,
                challenge_detected,
                challenge_type: challenge_type.clone(),
                timing_ms: Some(timing_ms),
            };
            observed = Observed {
                response_status: Some(status),
                body,
                url: url.to_string(),
                challenge_detected,
                challenge_type,
            };
            debug!(status, timing_ms, challenge_detected, "response observed");
            ctx.emit(CrawlEventType::ResponseObserved, target_id, format!("status {status}"));
        }
        Ok(Err(e)) => {
            warn!(error = %e, "network error issuing crawl request");
            response_update = RequestLogResponse {
                block_reason: Some(format!("network error: {e}")),
                ..Default::default()
            };
            observed = Observed {
                response_status: None,
                body: String::new(),
                url: url.to_string(),
                challenge_detected: false,
                challenge_type: None,
            };
        }
        Err(_) => {
            response_update = RequestLogResponse {
                block_reason: Some("request timed out".to_string()),
                timing_ms: Some(ctx.config.request_timeout_ms),
                ..Default::default()
            };
            observed = Observed {
                response_status: None,
                body: String::new(),
                url: url.to_string(),
                challenge_detected: false,
                challenge_type: None,
            };
        }
    }

    ctx.store.update_request_log_response(log.id, response_update)?;
    Ok(observed)
}

fn headers_to_json(headers: &reqwest::header::HeaderMap) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_str().unwrap_or("").to_string())))
        .collect();
    serde_json::Value::Object(map)
}

fn truncate(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        body.to_string()
    } else {
        body.chars().take(limit).collect()
    }
}

fn next_target_status(current: TargetStatus, green_light: GreenLightStatus) -> TargetStatus {
    match (current, green_light) {
        (TargetStatus::Paused, _) | (TargetStatus::Failed, _) => current,
        (_, GreenLightStatus::Established) => TargetStatus::Established,
        (TargetStatus::Established, _) => TargetStatus::Learning,
        (TargetStatus::Discovering, _) => TargetStatus::Learning,
        (other, _) => other,
    }
}

/// Conservative local response to a detected challenge: widen the delay
/// range by (+500ms min, +1000ms max) and record a `challenge` learning
/// event, independent of whether the advisor is also consulted this
/// iteration (spec §4.5, "Local DNA adaptation"). Returns `true` if the
/// learning-event write to the store failed, so the caller can feed it
/// into the session's store-failure circuit breaker.
fn widen_delay_locally(ctx: &RunContext, target_id: TargetId, dna_snapshot: &DnaSnapshot, challenge_type: Option<&str>) -> bool {
    let current = &dna_snapshot.dna.timing.delay_range_ms;
    let mut patch = serde_json::Map::new();
    patch.insert(
        "delay_range_ms".to_string(),
        serde_json::json!({ "min": current.min + 500, "max": current.max + 1000 }),
    );

    let mutation = GeneMutation {
        gene: Gene::Timing,
        patch,
        reason: "Widening inter-request delay after a detected challenge.".to_string(),
        confidence: 0.6,
        severity: MutationSeverity::Medium,
    };

    match ctx.mutator.mutate(target_id, mutation) {
        Ok(result) => {
            ctx.emit(CrawlEventType::MutationApplied, target_id, "widened delay_range_ms after challenge");
            let mut event = LearningEvent::new(
                target_id,
                LearningEventType::Challenge,
                "Challenge detected",
                format!(
                    "classified as {}; widened delay_range_ms to ({}, {})",
                    challenge_type.unwrap_or("unknown"),
                    result.snapshot.dna.timing.delay_range_ms.min,
                    result.snapshot.dna.timing.delay_range_ms.max
                ),
                -5,
            );
            event.challenge_type = Some(challenge_type.unwrap_or("unknown").to_string());
            event.challenge_solved = Some(false);
            event.dna_version_id = Some(result.snapshot.id);
            ctx.store.append_learning_event(&event).is_err()
        }
        Err(_) => {
            // Mutation failure here is non-fatal; the challenge is still
            // observable via the RequestLog and the depressed signal score.
            false
        }
    }
}

/// Builds the advisor context envelope from recent history, calls
/// `Analyze`, and applies every returned mutation (spec §4.5 step 6,
/// §4.4). Returns the DNA snapshot active after any mutation, or `None` if
/// the advisor produced no usable mutation.
#[instrument(skip(ctx, dna_snapshot, recent), fields(target_id = %target_id, trust_score))]
async fn consult_advisor_and_mutate(
    ctx: &RunContext,
    target_id: TargetId,
    dna_snapshot: &DnaSnapshot,
    trust_score: i32,
    recent: &[RequestLog],
) -> Option<DnaSnapshot> {
    let observations: Vec<Observation> = recent
        .iter()
        .rev()
        .take(5)
        .map(|log| {
            let kind = if log.challenge_detected {
                ObservationKind::Challenge
            } else if log.was_blocked {
                ObservationKind::Blocked
            } else {
                ObservationKind::Success
            };
            Observation {
                kind,
                summary: format!("{} {} -> {:?}", log.method, log.url, log.response_status),
                timestamp: log.created_at,
            }
        })
        .collect();

    let current_challenge = recent
        .iter()
        .rev()
        .find(|log| log.challenge_detected)
        .map(|log| ChallengeInfo {
            challenge_type: log.challenge_type.clone().unwrap_or_else(|| "unknown".to_string()),
            difficulty: "unknown".to_string(),
            attempts: recent.iter().filter(|r| r.challenge_detected).count() as u32,
        });

    let last_request = recent.last().map(|log| LastRequestView {
        method: log.method.clone(),
        url: log.url.clone(),
        status: log.response_status,
        timing_ms: log.timing_ms,
    });

    let learning_events_summary: Vec<LearningEventSummary> = Vec::new();

    let advisor_context = AdvisorContext {
        target_summary: format!("target {target_id}, trust_score={trust_score}"),
        dna: dna_snapshot.dna.clone(),
        observations,
        learning_events: learning_events_summary,
        current_challenge,
        last_request,
    };

    ctx.emit(CrawlEventType::AdvisorConsulted, target_id, "consulting advisor (canNavigate=false)");

    let response = match ctx.advisor.analyze(&advisor_context, trust_score).await {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "advisor consultation skipped");
            return None;
        }
    };

    let mut latest = dna_snapshot.clone();
    for suggestion in response.mutations {
        let gene = suggestion.gene;
        let mutation = GeneMutation {
            gene,
            patch: suggestion.change,
            reason: suggestion.reason,
            confidence: suggestion.confidence,
            severity: suggestion.risk_level,
        };
        match ctx.mutator.mutate(target_id, mutation) {
            Ok(result) => {
                ctx.emit(
                    CrawlEventType::MutationApplied,
                    target_id,
                    format!("advisor mutation on {} gene", gene.as_str()),
                );
                latest = result.snapshot;
            }
            Err(_) => continue,
        }
    }
    Some(latest)
}

fn record_store_failure(failures: &mut Vec<Instant>) {
    failures.push(Instant::now());
}

fn too_many_store_failures(failures: &[Instant]) -> bool {
    let window = Duration::from_secs(STORE_FAILURE_WINDOW_SECS as u64);
    let now = Instant::now();
    let recent_count = failures.iter().filter(|t| now.duration_since(**t) <= window).count();
    recent_count > STORE_FAILURE_LIMIT
}

fn fail_session(ctx: &RunContext, target_id: TargetId, reason: &str) {
    warn!(%target_id, reason, "crawl session failing");
    let event = LearningEvent::new(target_id, LearningEventType::Other, "Session failed", reason, 0);
    if let Err(e) = ctx.store.append_learning_event(&event) {
        warn!(error = %e, "failed to persist session-failed learning event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_status_promotes_to_established() {
        assert_eq!(
            next_target_status(TargetStatus::Learning, GreenLightStatus::Established),
            TargetStatus::Established
        );
    }

    #[test]
    fn next_status_leaves_paused_alone() {
        assert_eq!(next_target_status(TargetStatus::Paused, GreenLightStatus::Green), TargetStatus::Paused);
    }

    #[test]
    fn next_status_moves_discovering_to_learning() {
        assert_eq!(next_target_status(TargetStatus::Discovering, GreenLightStatus::Red), TargetStatus::Learning);
    }

    #[test]
    fn select_url_uses_seed_on_first_iteration() {
        let request = CrawlRequest::new(TargetId::new(), "https://example.com", CrawlMode::Explore);
        let dna = Dna::default();
        assert_eq!(select_url(&request, &dna, 1, true), "https://example.com");
    }

    #[test]
    fn select_url_cycles_explore_paths_afterward() {
        let request = CrawlRequest::new(TargetId::new(), "https://example.com", CrawlMode::Explore);
        let dna = Dna::default();
        assert_eq!(select_url(&request, &dna, 2, true), "https://example.com/blog");
        assert_eq!(select_url(&request, &dna, 3, true), "https://example.com/about");
    }

    #[test]
    fn select_url_falls_back_to_seed_when_navigation_is_not_allowed() {
        let request = CrawlRequest::new(TargetId::new(), "https://example.com", CrawlMode::Explore);
        let dna = Dna::default();
        assert_eq!(select_url(&request, &dna, 2, false), "https://example.com");
        assert_eq!(select_url(&request, &dna, 5, false), "https://example.com");
    }

    #[test]
    fn truncate_keeps_short_bodies_intact() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn too_many_store_failures_trips_after_limit() {
        let now = Instant::now();
        let failures = vec![now, now, now, now];
        assert!(too_many_store_failures(&failures));
    }

    #[test]
    fn few_store_failures_do_not_trip() {
        let now = Instant::now();
        let failures = vec![now, now];
        assert!(!too_many_store_failures(&failures));
    }
}
