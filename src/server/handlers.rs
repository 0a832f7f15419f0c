use super::AppState;
use super::html;
use crate::logging::{LogBuffer, LogEntry, LogLevel};
use crate::status::{ConnectionPhase, ConnectionStatus};
use axum::Json;
use axum::extract::{Query, State};
use axum::response::Html;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub(super) const DEFAULT_LOG_LIMIT: usize = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct HealthResponse {
    status: &'static str,
    whatsapp: &'static str,
    /// Seconds since the status server started.
    uptime: f64,
    total_messages: u64,
    last_message: Option<DateTime<Utc>>,
    timestamp: DateTime<Utc>,
}

pub(super) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.status.snapshot().await;
    Json(HealthResponse {
        status: "online",
        whatsapp: if status.state == ConnectionPhase::Connected {
            "connected"
        } else {
            "disconnected"
        },
        uptime: state.started_at.elapsed().as_secs_f64(),
        total_messages: status.total_messages_captured,
        last_message: status.last_message_time,
        timestamp: Utc::now(),
    })
}

pub(super) async fn qr(State(state): State<AppState>) -> Html<String> {
    let status = state.status.snapshot().await;
    Html(html::qr_page(&status))
}

pub(super) async fn stats(State(state): State<AppState>) -> Json<ConnectionStatus> {
    Json(state.status.snapshot().await)
}

/// Raw `?limit=&level=` values; malformed input falls back instead of failing.
#[derive(Debug, Default, Deserialize)]
pub(super) struct LogQuery {
    limit: Option<String>,
    level: Option<String>,
}

/// Level filter requested by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum LevelFilter {
    All,
    Only(LogLevel),
    /// Unrecognised level: matches nothing.
    Unknown,
}

/// Entries picked for one `/logs` request.
#[derive(Debug)]
pub(super) struct LogSelection {
    pub limit: usize,
    pub level: LevelFilter,
    /// Entries in the whole buffer, regardless of filter.
    pub total: usize,
    /// Entries matching the level filter.
    pub matching: usize,
    /// Newest first, at most `limit`.
    pub entries: Vec<LogEntry>,
}

impl LogQuery {
    fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_LOG_LIMIT)
    }

    fn level(&self) -> LevelFilter {
        match self.level.as_deref().map(str::trim) {
            None | Some("") => LevelFilter::All,
            Some(raw) => raw
                .parse::<LogLevel>()
                .map(LevelFilter::Only)
                .unwrap_or(LevelFilter::Unknown),
        }
    }
}

pub(super) fn select_logs(logs: &LogBuffer, query: &LogQuery) -> LogSelection {
    let limit = query.limit();
    let level = query.level();
    let total = logs.len();

    let (matching, entries) = match level {
        LevelFilter::All => (logs.matching(None), logs.recent(limit, None)),
        LevelFilter::Only(l) => (logs.matching(Some(l)), logs.recent(limit, Some(l))),
        LevelFilter::Unknown => (0, Vec::new()),
    };

    LogSelection {
        limit,
        level,
        total,
        matching,
        entries,
    }
}

pub(super) async fn logs_page(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Html<String> {
    let selection = select_logs(&state.logs, &query);
    Html(html::logs_page(&selection))
}

#[derive(Debug, Serialize)]
pub(super) struct LogsResponse {
    total: usize,
    showing: usize,
    logs: Vec<LogEntry>,
}

pub(super) async fn logs_json(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Json<LogsResponse> {
    let selection = select_logs(&state.logs, &query);
    Json(LogsResponse {
        total: selection.total,
        showing: selection.limit.min(selection.matching),
        logs: selection.entries,
    })
}
