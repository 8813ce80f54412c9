//! SQLite-backed persistence for workflows, tasks, notifications,
//! preferences, and the user/role directory.
//!
//! Implements the `EngineStore` port used at dispatch time, plus the
//! admin CRUD the gateway exposes.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use wikiflow_core::error::{Result, WikiflowError};
use wikiflow_core::traits::EngineStore;
use wikiflow_core::types::{
    Channel, EventPayload, NewNotification, NewTask, Notification, NotificationPreference, Task,
    TaskStatus, UserRecord, Workflow,
};

/// SQLite-backed store for all engine data.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

const WORKFLOW_COLUMNS: &str =
    "id, name, description, trigger_event, conditions, actions, is_active, priority, created_at";
const TASK_COLUMNS: &str =
    "id, task_type, title, assigned_to, status, due_date, metadata, created_at, updated_at";
const NOTIFICATION_COLUMNS: &str = "id, user_id, notification_type, title, body, link, metadata, \
     channels_sent, scheduled_for, is_read, created_at";

impl SqliteStore {
    /// Open or create the database. `":memory:"` gives a throwaway store.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| WikiflowError::storage(format!("DB open: {e}")))?;

        // WAL for concurrent readers; in-memory databases ignore it
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| WikiflowError::storage(format!("Lock: {e}")))
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            -- Workflow rules (trigger → conditions → actions)
            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                trigger_event TEXT NOT NULL,
                conditions TEXT NOT NULL DEFAULT '{}',   -- JSON object
                actions TEXT NOT NULL DEFAULT '[]',      -- JSON array of tagged actions
                is_active INTEGER NOT NULL DEFAULT 1,
                priority INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_workflows_trigger ON workflows(trigger_event, is_active);

            -- Tasks created by workflows
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                task_type TEXT NOT NULL,
                title TEXT NOT NULL,
                assigned_to TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                due_date TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks(assigned_to);

            -- Notifications (in-app inbox + scheduled batches)
            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                notification_type TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL DEFAULT '',
                link TEXT NOT NULL DEFAULT '/',
                metadata TEXT NOT NULL DEFAULT '{}',
                channels_sent TEXT NOT NULL DEFAULT '[]',
                scheduled_for TEXT,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id);

            -- One row per (user, type, channel); absence = enabled + each
            CREATE TABLE IF NOT EXISTS notification_preferences (
                user_id TEXT NOT NULL,
                notification_type TEXT NOT NULL,
                channel TEXT NOT NULL,
                is_enabled INTEGER NOT NULL DEFAULT 1,
                frequency TEXT NOT NULL DEFAULT 'each',
                PRIMARY KEY (user_id, notification_type, channel)
            );

            -- User directory
            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                email TEXT
            );
            CREATE TABLE IF NOT EXISTS user_roles (
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                PRIMARY KEY (user_id, role)
            );
            ",
        )
        .map_err(|e| WikiflowError::storage(format!("Migration: {e}")))?;
        Ok(())
    }

    // ─── Workflows ──────────────────────────────────────────

    /// Validate and save (insert or replace) a workflow.
    pub fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        workflow.validate()?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO workflows
             (id, name, description, trigger_event, conditions, actions, is_active, priority, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                workflow.id,
                workflow.name,
                workflow.description,
                workflow.trigger_event,
                serde_json::to_string(&workflow.conditions)?,
                serde_json::to_string(&workflow.actions)?,
                workflow.is_active,
                workflow.priority,
                ts(&workflow.created_at),
            ],
        )
        .map_err(|e| WikiflowError::storage(format!("Save workflow: {e}")))?;
        tracing::debug!("💾 Saved workflow '{}' ({})", workflow.name, workflow.id);
        Ok(())
    }

    /// Get one workflow by id.
    pub fn get_workflow(&self, id: &str) -> Result<Workflow> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = ?1"),
                params![id],
                WorkflowRow::from_row,
            )
            .optional()
            .map_err(|e| WikiflowError::storage(format!("Get workflow: {e}")))?
            .ok_or_else(|| WikiflowError::NotFound(format!("workflow '{id}'")))?;
        row.into_workflow()
    }

    /// List every workflow, highest priority first.
    pub fn list_workflows(&self) -> Result<Vec<Workflow>> {
        self.query_workflows(
            &format!(
                "SELECT {WORKFLOW_COLUMNS} FROM workflows
                 ORDER BY priority DESC, created_at ASC, id ASC"
            ),
            params![],
        )
    }

    /// Delete a workflow. Returns whether a row was removed.
    pub fn delete_workflow(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let n = conn
            .execute("DELETE FROM workflows WHERE id = ?1", params![id])
            .map_err(|e| WikiflowError::storage(format!("Delete workflow: {e}")))?;
        Ok(n > 0)
    }

    fn load_active_workflows(&self, trigger_event: &str) -> Result<Vec<Workflow>> {
        self.query_workflows(
            &format!(
                "SELECT {WORKFLOW_COLUMNS} FROM workflows
                 WHERE trigger_event = ?1 AND is_active = 1
                 ORDER BY priority DESC, created_at ASC, id ASC"
            ),
            params![trigger_event],
        )
    }

    /// Rows whose JSON no longer decodes are skipped with a warning.
    fn query_workflows<P: rusqlite::Params>(&self, sql: &str, p: P) -> Result<Vec<Workflow>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| WikiflowError::storage(format!("Prepare: {e}")))?;
        let rows: Vec<WorkflowRow> = stmt
            .query_map(p, WorkflowRow::from_row)
            .map_err(|e| WikiflowError::storage(format!("Load workflows: {e}")))?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| WikiflowError::storage(format!("Load workflows: {e}")))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id.clone();
                row.into_workflow()
                    .map_err(|e| tracing::warn!("⚠️ Skipping workflow '{id}': {e}"))
                    .ok()
            })
            .collect())
    }

    // ─── Tasks ──────────────────────────────────────────────

    fn insert_task_row(&self, new: NewTask) -> Result<Task> {
        let now = Utc::now();
        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            task_type: new.task_type,
            title: new.title,
            assigned_to: new.assigned_to,
            status: TaskStatus::Pending,
            due_date: new.due_date,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        };
        let conn = self.lock()?;
        conn.execute(
            &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                task.id,
                task.task_type,
                task.title,
                task.assigned_to,
                task.status.as_str(),
                task.due_date.as_ref().map(ts),
                serde_json::to_string(&task.metadata)?,
                ts(&task.created_at),
                ts(&task.updated_at),
            ],
        )
        .map_err(|e| WikiflowError::storage(format!("Insert task: {e}")))?;
        Ok(task)
    }

    /// Get one task by id.
    pub fn get_task(&self, id: &str) -> Result<Task> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                TaskRow::from_row,
            )
            .optional()
            .map_err(|e| WikiflowError::storage(format!("Get task: {e}")))?
            .ok_or_else(|| WikiflowError::NotFound(format!("task '{id}'")))?;
        row.into_task()
    }

    /// List tasks, optionally for one assignee, newest first.
    pub fn list_tasks(&self, assigned_to: Option<&str>) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE (?1 IS NULL OR assigned_to = ?1)
                 ORDER BY created_at DESC, id ASC"
            ))
            .map_err(|e| WikiflowError::storage(format!("Prepare: {e}")))?;
        let rows: Vec<TaskRow> = stmt
            .query_map(params![assigned_to], TaskRow::from_row)
            .map_err(|e| WikiflowError::storage(format!("List tasks: {e}")))?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| WikiflowError::storage(format!("List tasks: {e}")))?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// Move a task to a new status, enforcing allowed transitions.
    pub fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<Task> {
        let mut task = self.get_task(id)?;
        task.status = task.status.transition(status)?;
        task.updated_at = Utc::now();

        let conn = self.lock()?;
        conn.execute(
            "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![task.status.as_str(), ts(&task.updated_at), task.id],
        )
        .map_err(|e| WikiflowError::storage(format!("Update task: {e}")))?;
        Ok(task)
    }

    // ─── Notifications ─────────────────────────────────────

    fn insert_notification_row(&self, new: NewNotification) -> Result<Notification> {
        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: new.user_id,
            notification_type: new.notification_type,
            title: new.title,
            body: new.body,
            link: new.link,
            metadata: new.metadata,
            channels_sent: new.channels_sent,
            scheduled_for: new.scheduled_for,
            is_read: false,
            created_at: Utc::now(),
        };
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO notifications ({NOTIFICATION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                notification.id,
                notification.user_id,
                notification.notification_type,
                notification.title,
                notification.body,
                notification.link,
                serde_json::to_string(&notification.metadata)?,
                serde_json::to_string(&notification.channels_sent)?,
                notification.scheduled_for.as_ref().map(ts),
                notification.is_read,
                ts(&notification.created_at),
            ],
        )
        .map_err(|e| WikiflowError::storage(format!("Insert notification: {e}")))?;
        Ok(notification)
    }

    /// A user's notifications, newest first.
    pub fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE user_id = ?1 ORDER BY created_at DESC, id ASC"
            ))
            .map_err(|e| WikiflowError::storage(format!("Prepare: {e}")))?;
        let rows: Vec<NotificationRow> = stmt
            .query_map(params![user_id], NotificationRow::from_row)
            .map_err(|e| WikiflowError::storage(format!("List notifications: {e}")))?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| WikiflowError::storage(format!("List notifications: {e}")))?;
        rows.into_iter().map(NotificationRow::into_notification).collect()
    }

    /// Mark a notification as read. Returns whether it exists.
    pub fn mark_notification_read(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let n = conn
            .execute("UPDATE notifications SET is_read = 1 WHERE id = ?1", params![id])
            .map_err(|e| WikiflowError::storage(format!("Mark read: {e}")))?;
        Ok(n > 0)
    }

    /// Delete a notification. Returns whether a row was removed.
    pub fn delete_notification(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let n = conn
            .execute("DELETE FROM notifications WHERE id = ?1", params![id])
            .map_err(|e| WikiflowError::storage(format!("Delete notification: {e}")))?;
        Ok(n > 0)
    }

    // ─── Preferences ────────────────────────────────────────

    /// Insert or replace one preference row.
    pub fn set_preference(&self, pref: &NotificationPreference) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO notification_preferences
             (user_id, notification_type, channel, is_enabled, frequency)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                pref.user_id,
                pref.notification_type,
                pref.channel.as_str(),
                pref.is_enabled,
                pref.frequency.as_str(),
            ],
        )
        .map_err(|e| WikiflowError::storage(format!("Save preference: {e}")))?;
        Ok(())
    }

    /// All stored preference rows for a user.
    pub fn list_preferences(&self, user_id: &str) -> Result<Vec<NotificationPreference>> {
        self.query_preferences(
            "SELECT user_id, notification_type, channel, is_enabled, frequency
             FROM notification_preferences WHERE user_id = ?1
             ORDER BY notification_type, channel",
            params![user_id],
        )
    }

    fn query_preferences<P: rusqlite::Params>(
        &self,
        sql: &str,
        p: P,
    ) -> Result<Vec<NotificationPreference>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| WikiflowError::storage(format!("Prepare: {e}")))?;
        let rows: Vec<(String, String, String, bool, String)> = stmt
            .query_map(p, |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })
            .map_err(|e| WikiflowError::storage(format!("Load preferences: {e}")))?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| WikiflowError::storage(format!("Load preferences: {e}")))?;

        rows.into_iter()
            .map(|(user_id, notification_type, channel, is_enabled, frequency)| {
                Ok(NotificationPreference {
                    user_id,
                    notification_type,
                    channel: channel.parse()?,
                    is_enabled,
                    frequency: frequency.parse()?,
                })
            })
            .collect()
    }

    // ─── Users & roles ──────────────────────────────────────

    /// Insert or replace a directory entry and its role memberships.
    pub fn upsert_user(&self, user: &UserRecord) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| WikiflowError::storage(format!("Begin: {e}")))?;
        tx.execute(
            "INSERT OR REPLACE INTO users (user_id, email) VALUES (?1, ?2)",
            params![user.user_id, user.email],
        )
        .map_err(|e| WikiflowError::storage(format!("Save user: {e}")))?;
        tx.execute("DELETE FROM user_roles WHERE user_id = ?1", params![user.user_id])
            .map_err(|e| WikiflowError::storage(format!("Clear roles: {e}")))?;
        for role in &user.roles {
            tx.execute(
                "INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?1, ?2)",
                params![user.user_id, role],
            )
            .map_err(|e| WikiflowError::storage(format!("Save role: {e}")))?;
        }
        tx.commit()
            .map_err(|e| WikiflowError::storage(format!("Commit: {e}")))?;
        Ok(())
    }

    fn role_members(&self, role: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT user_id FROM user_roles WHERE role = ?1 ORDER BY user_id")
            .map_err(|e| WikiflowError::storage(format!("Prepare: {e}")))?;
        let ids = stmt
            .query_map(params![role], |row| row.get(0))
            .map_err(|e| WikiflowError::storage(format!("Role lookup: {e}")))?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(|e| WikiflowError::storage(format!("Role lookup: {e}")))?;
        Ok(ids)
    }

    fn email_of(&self, user_id: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let email: Option<Option<String>> = conn
            .query_row(
                "SELECT email FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| WikiflowError::storage(format!("Email lookup: {e}")))?;
        Ok(email.flatten().filter(|e| !e.is_empty()))
    }
}

#[async_trait]
impl EngineStore for SqliteStore {
    async fn active_workflows(&self, trigger_event: &str) -> Result<Vec<Workflow>> {
        self.load_active_workflows(trigger_event)
    }

    async fn users_with_role(&self, role: &str) -> Result<Vec<String>> {
        self.role_members(role)
    }

    async fn user_email(&self, user_id: &str) -> Result<Option<String>> {
        self.email_of(user_id)
    }

    async fn preferences(
        &self,
        user_id: &str,
        notification_type: &str,
    ) -> Result<Vec<NotificationPreference>> {
        self.query_preferences(
            "SELECT user_id, notification_type, channel, is_enabled, frequency
             FROM notification_preferences WHERE user_id = ?1 AND notification_type = ?2",
            params![user_id, notification_type],
        )
    }

    async fn insert_task(&self, task: NewTask) -> Result<Task> {
        self.insert_task_row(task)
    }

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        self.insert_notification_row(notification)
    }
}

// ─── Row decoding ──────────────────────────────────────────

struct WorkflowRow {
    id: String,
    name: String,
    description: String,
    trigger_event: String,
    conditions: String,
    actions: String,
    is_active: bool,
    priority: i32,
    created_at: String,
}

impl WorkflowRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            trigger_event: row.get(3)?,
            conditions: row.get(4)?,
            actions: row.get(5)?,
            is_active: row.get(6)?,
            priority: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_workflow(self) -> Result<Workflow> {
        Ok(Workflow {
            conditions: serde_json::from_str(&self.conditions)?,
            actions: serde_json::from_str(&self.actions)?,
            created_at: parse_ts(&self.created_at)?,
            id: self.id,
            name: self.name,
            description: self.description,
            trigger_event: self.trigger_event,
            is_active: self.is_active,
            priority: self.priority,
        })
    }
}

struct TaskRow {
    id: String,
    task_type: String,
    title: String,
    assigned_to: String,
    status: String,
    due_date: Option<String>,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            task_type: row.get(1)?,
            title: row.get(2)?,
            assigned_to: row.get(3)?,
            status: row.get(4)?,
            due_date: row.get(5)?,
            metadata: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_task(self) -> Result<Task> {
        Ok(Task {
            status: self.status.parse()?,
            due_date: self.due_date.as_deref().map(parse_ts).transpose()?,
            metadata: parse_payload(&self.metadata)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            id: self.id,
            task_type: self.task_type,
            title: self.title,
            assigned_to: self.assigned_to,
        })
    }
}

struct NotificationRow {
    id: String,
    user_id: String,
    notification_type: String,
    title: String,
    body: String,
    link: String,
    metadata: String,
    channels_sent: String,
    scheduled_for: Option<String>,
    is_read: bool,
    created_at: String,
}

impl NotificationRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            notification_type: row.get(2)?,
            title: row.get(3)?,
            body: row.get(4)?,
            link: row.get(5)?,
            metadata: row.get(6)?,
            channels_sent: row.get(7)?,
            scheduled_for: row.get(8)?,
            is_read: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    fn into_notification(self) -> Result<Notification> {
        let channels_sent: Vec<Channel> = serde_json::from_str(&self.channels_sent)?;
        Ok(Notification {
            metadata: parse_payload(&self.metadata)?,
            channels_sent,
            scheduled_for: self.scheduled_for.as_deref().map(parse_ts).transpose()?,
            created_at: parse_ts(&self.created_at)?,
            id: self.id,
            user_id: self.user_id,
            notification_type: self.notification_type,
            title: self.title,
            body: self.body,
            link: self.link,
            is_read: self.is_read,
        })
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| WikiflowError::storage(format!("Bad timestamp '{s}': {e}")))
}

fn parse_payload(s: &str) -> Result<EventPayload> {
    Ok(serde_json::from_str(s)?)
}
