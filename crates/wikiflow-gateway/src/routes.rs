//! API route handlers for the gateway.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use wikiflow_core::types::{NotificationPreference, TaskStatus, UserRecord, Workflow};
use wikiflow_workflows::{SendNotification, WorkflowEvent};

use super::error::ApiError;
use super::server::AppState;

type ApiResult = Result<Json<Value>, ApiError>;

/// Decode a raw request body. Failures surface as a 500 `{error}`.
fn parse_body<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Payload(e.to_string()))
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "wikiflow-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Run every workflow bound to an event.
pub async fn trigger_workflow(State(state): State<Arc<AppState>>, body: String) -> ApiResult {
    let event: WorkflowEvent = parse_body(&body)?;
    tracing::debug!("📨 Event '{}' received", event.event);
    let results = state.engine.dispatch(&event.event, &event.data).await?;
    Ok(Json(json!({"success": true, "results": results})))
}

/// Direct send to one user, honoring their preferences.
pub async fn send_notification(State(state): State<Arc<AppState>>, body: String) -> ApiResult {
    let request: SendNotification = parse_body(&body)?;
    let report = state.engine.send_notification(request).await?;
    Ok(Json(json!({
        "success": true,
        "channelsSent": report.channels_sent,
        "results": report.results,
    })))
}

// ─── Workflows ──────────────────────────────────────────────

pub async fn list_workflows(State(state): State<Arc<AppState>>) -> ApiResult {
    let workflows = state.store.list_workflows()?;
    Ok(Json(json!({"workflows": workflows})))
}

/// Create or replace a workflow. Invalid definitions are rejected with 400.
pub async fn save_workflow(
    State(state): State<Arc<AppState>>,
    Json(workflow): Json<Workflow>,
) -> ApiResult {
    state.store.save_workflow(&workflow)?;
    tracing::info!("🧩 Workflow '{}' saved ({})", workflow.name, workflow.id);
    Ok(Json(json!({"ok": true, "workflow": workflow})))
}

pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let workflow = state.store.get_workflow(&id)?;
    Ok(Json(json!({"workflow": workflow})))
}

pub async fn delete_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    if !state.store.delete_workflow(&id)? {
        return Err(ApiError::NotFound(format!("workflow '{id}'")));
    }
    Ok(Json(json!({"ok": true})))
}

// ─── Tasks ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub assigned_to: Option<String>,
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskQuery>,
) -> ApiResult {
    let tasks = state.store.list_tasks(query.assigned_to.as_deref())?;
    Ok(Json(json!({"tasks": tasks})))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: TaskStatus,
}

pub async fn update_task_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult {
    let task = state.store.update_task_status(&id, update.status)?;
    Ok(Json(json!({"ok": true, "task": task})))
}

// ─── Notifications ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

impl UserQuery {
    fn require(self) -> Result<String, ApiError> {
        self.user_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::BadRequest("user_id is required".into()))
    }
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ApiResult {
    let user_id = query.require()?;
    let notifications = state.store.list_notifications(&user_id)?;
    let unread = notifications.iter().filter(|n| !n.is_read).count();
    Ok(Json(json!({"notifications": notifications, "unread": unread})))
}

pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    if !state.store.mark_notification_read(&id)? {
        return Err(ApiError::NotFound(format!("notification '{id}'")));
    }
    Ok(Json(json!({"ok": true})))
}

pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    if !state.store.delete_notification(&id)? {
        return Err(ApiError::NotFound(format!("notification '{id}'")));
    }
    Ok(Json(json!({"ok": true})))
}

// ─── Preferences & users ────────────────────────────────────

pub async fn list_preferences(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ApiResult {
    let user_id = query.require()?;
    let preferences = state.store.list_preferences(&user_id)?;
    Ok(Json(json!({"preferences": preferences})))
}

pub async fn set_preference(
    State(state): State<Arc<AppState>>,
    Json(pref): Json<NotificationPreference>,
) -> ApiResult {
    state.store.set_preference(&pref)?;
    Ok(Json(json!({"ok": true, "preference": pref})))
}

#[derive(Debug, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

pub async fn upsert_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<UserUpdate>,
) -> ApiResult {
    let user = UserRecord {
        user_id: id,
        email: update.email,
        roles: update.roles,
    };
    state.store.upsert_user(&user)?;
    Ok(Json(json!({"ok": true, "user": user})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use wikiflow_core::config::NotificationConfig;
    use wikiflow_core::types::{Action, Channel, Frequency, NotifyTarget, NotifyUserAction};
    use wikiflow_workflows::{LogTransport, SqliteStore, WorkflowEngine};

    fn test_state() -> State<Arc<AppState>> {
        let store = Arc::new(SqliteStore::open(std::path::Path::new(":memory:")).unwrap());
        let engine = WorkflowEngine::new(
            store.clone(),
            Arc::new(LogTransport),
            &NotificationConfig::default(),
        );
        State(Arc::new(AppState {
            engine: Arc::new(engine),
            store,
            service_key: None,
            start_time: std::time::Instant::now(),
        }))
    }

    fn comment_workflow() -> Workflow {
        Workflow::new(
            "comment flow",
            "comment_created",
            vec![Action::NotifyUser(NotifyUserAction {
                notification_type: "comment_on_post".into(),
                target: NotifyTarget::PostAuthor,
            })],
        )
    }

    #[tokio::test]
    async fn test_health_check() {
        let json = health_check(test_state()).await.0;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "wikiflow-gateway");
    }

    #[tokio::test]
    async fn test_trigger_workflow_end_to_end() {
        let state = test_state();
        state.store.save_workflow(&comment_workflow()).unwrap();

        let body = json!({
            "event": "comment_created",
            "data": {"post_author_id": "u1", "post_slug": "x", "actor_id": "u2"}
        })
        .to_string();
        let json = trigger_workflow(state.clone(), body).await.unwrap().0;
        assert_eq!(json["success"], true);
        assert_eq!(json["results"][0]["workflow"], "comment flow");
        assert_eq!(json["results"][0]["actions"][0], "notification_sent: 1");

        let inbox = list_notifications(
            state,
            Query(UserQuery {
                user_id: Some("u1".into()),
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(inbox["unread"], 1);
        assert_eq!(inbox["notifications"][0]["link"], "/wiki/x");
    }

    #[tokio::test]
    async fn test_trigger_workflow_bad_payload() {
        let err = trigger_workflow(test_state(), "[1, 2".into()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_send_notification_reports_channels() {
        let state = test_state();
        state
            .store
            .set_preference(&NotificationPreference {
                user_id: "u1".into(),
                notification_type: "welcome".into(),
                channel: Channel::Email,
                is_enabled: true,
                frequency: Frequency::Daily,
            })
            .unwrap();

        let body = json!({
            "userId": "u1",
            "type": "welcome",
            "title": "Bem-vindo!",
            "channels": ["in_app", "email", "push"]
        })
        .to_string();
        let json = send_notification(state, body).await.unwrap().0;
        assert_eq!(json["success"], true);
        assert_eq!(json["channelsSent"], json!(["in_app"]));
        assert_eq!(json["results"]["in_app"], "sent");
        assert_eq!(json["results"]["email"], "scheduled_daily");
        assert_eq!(json["results"]["push"], "not_implemented");
    }

    #[tokio::test]
    async fn test_send_notification_missing_fields() {
        let err = send_notification(test_state(), json!({"type": "welcome"}).to_string())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_workflow_crud() {
        let state = test_state();
        let saved = save_workflow(state.clone(), Json(comment_workflow()))
            .await
            .unwrap()
            .0;
        let id = saved["workflow"]["id"].as_str().unwrap().to_string();

        let listed = list_workflows(state.clone()).await.unwrap().0;
        assert_eq!(listed["workflows"].as_array().unwrap().len(), 1);

        let fetched = get_workflow(state.clone(), Path(id.clone())).await.unwrap().0;
        assert_eq!(fetched["workflow"]["id"], id.as_str());
        assert_eq!(fetched["workflow"]["name"], saved["workflow"]["name"]);

        assert!(delete_workflow(state.clone(), Path(id.clone())).await.is_ok());
        let err = get_workflow(state.clone(), Path(id.clone())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let err = delete_workflow(state, Path(id)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_workflow_is_bad_request() {
        let err = save_workflow(test_state(), Json(Workflow::new("", "x", vec![])))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_task_status_flow() {
        let state = test_state();
        upsert_user(
            state.clone(),
            Path("a1".into()),
            Json(UserUpdate {
                email: None,
                roles: vec!["admin".into()],
            }),
        )
        .await
        .unwrap();
        state
            .store
            .save_workflow(&Workflow::new(
                "review",
                "post_submitted",
                vec![Action::CreateTask(wikiflow_core::types::CreateTaskAction {
                    task_type: "review".into(),
                    assigned_to_role: "admin".into(),
                    title_template: "Revisar {{post_title}}".into(),
                    due_days: None,
                })],
            ))
            .unwrap();
        trigger_workflow(
            state.clone(),
            json!({"event": "post_submitted", "data": {"post_title": "X"}}).to_string(),
        )
        .await
        .unwrap();

        let tasks = list_tasks(
            state.clone(),
            Query(TaskQuery {
                assigned_to: Some("a1".into()),
            }),
        )
        .await
        .unwrap()
        .0;
        let id = tasks["tasks"][0]["id"].as_str().unwrap().to_string();
        assert_eq!(tasks["tasks"][0]["title"], "Revisar X");

        let done = update_task_status(
            state.clone(),
            Path(id.clone()),
            Json(StatusUpdate {
                status: TaskStatus::Completed,
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(done["task"]["status"], "completed");

        let err = update_task_status(
            state.clone(),
            Path(id),
            Json(StatusUpdate {
                status: TaskStatus::Pending,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = update_task_status(
            state,
            Path("missing".into()),
            Json(StatusUpdate {
                status: TaskStatus::Completed,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_user_id_is_required() {
        let err = list_preferences(test_state(), Query(UserQuery { user_id: None }))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_notification_read_and_delete() {
        let state = test_state();
        send_notification(
            state.clone(),
            json!({"userId": "u1", "type": "welcome", "title": "Oi"}).to_string(),
        )
        .await
        .unwrap();
        let inbox = list_notifications(
            state.clone(),
            Query(UserQuery {
                user_id: Some("u1".into()),
            }),
        )
        .await
        .unwrap()
        .0;
        let id = inbox["notifications"][0]["id"].as_str().unwrap().to_string();

        mark_notification_read(state.clone(), Path(id.clone())).await.unwrap();
        delete_notification(state.clone(), Path(id.clone())).await.unwrap();
        let err = mark_notification_read(state, Path(id)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
