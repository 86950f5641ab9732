//! Common record fields: identity, timestamps, soft deletion and auditing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Timestamps shared by every persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Soft deletion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Timestamps {
    /// Created and updated at `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Record a modification.
    pub const fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Mark deleted; later calls keep the first deletion time.
    pub const fn soft_delete(&mut self, now: DateTime<Utc>) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(now);
            self.updated_at = now;
        }
    }

    /// Whether the record is soft deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Record with a numeric primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseModel {
    /// Primary key.
    pub id: i64,
    /// Lifecycle timestamps, flattened into the record.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl BaseModel {
    /// Fresh record created at `now`.
    #[must_use]
    pub const fn new(id: i64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            timestamps: Timestamps::new(now),
        }
    }
}

/// Record with a UUID primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UuidBaseModel {
    /// Primary key.
    pub id: Uuid,
    /// Lifecycle timestamps, flattened into the record.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl UuidBaseModel {
    /// Fresh record with a random v4 identifier.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamps: Timestamps::new(now),
        }
    }
}

/// [`BaseModel`] that also records who created and last changed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditableModel {
    /// Identity and timestamps.
    #[serde(flatten)]
    pub base: BaseModel,
    /// Creating user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<i64>,
    /// Last modifying user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<i64>,
}

impl AuditableModel {
    /// Record created by `user` at `now`.
    #[must_use]
    pub const fn new(id: i64, user: Option<i64>, now: DateTime<Utc>) -> Self {
        Self {
            base: BaseModel::new(id, now),
            created_by: user,
            updated_by: user,
        }
    }

    /// Record a modification by `user`.
    pub const fn touch_by(&mut self, user: Option<i64>, now: DateTime<Utc>) {
        self.base.timestamps.touch(now);
        self.updated_by = user;
    }
}

/// One entry in an audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    /// Identity and timestamps.
    #[serde(flatten)]
    pub base: BaseModel,
    /// Acting user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// What happened, e.g. `update`.
    pub action: String,
    /// Kind of record affected.
    pub resource: String,
    /// Identifier of the affected record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// State before the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_data: Option<Value>,
    /// State after the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_data: Option<Value>,
    /// Client address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Client user agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl AuditLog {
    /// Entry for `action` on `resource`.
    pub fn new(
        base: BaseModel,
        action: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            base,
            user_id: None,
            action: action.into(),
            resource: resource.into(),
            resource_id: None,
            old_data: None,
            new_data: None,
            ip_address: None,
            user_agent: None,
        }
    }

    /// Attribute the entry to `user_id`.
    #[must_use]
    pub const fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Identify the affected record.
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Record the state before and after the change.
    #[must_use]
    pub fn with_change(mut self, old: Option<Value>, new: Option<Value>) -> Self {
        self.old_data = old;
        self.new_data = new;
        self
    }

    /// Record the client address and user agent.
    #[must_use]
    pub fn with_client(
        mut self,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        self.ip_address = Some(ip_address.into());
        self.user_agent = Some(user_agent.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[rstest]
    fn soft_delete_keeps_first_time(now: DateTime<Utc>) {
        let mut stamps = Timestamps::new(now);
        assert!(!stamps.is_deleted());
        let later = now + chrono::Duration::hours(1);
        stamps.soft_delete(later);
        stamps.soft_delete(later + chrono::Duration::hours(1));
        assert_eq!(stamps.deleted_at, Some(later));
        assert_eq!(stamps.updated_at, later);
    }

    #[rstest]
    fn base_fields_are_flattened(now: DateTime<Utc>) {
        let model = AuditableModel::new(7, Some(3), now);
        let value = serde_json::to_value(model).expect("serialise");
        assert_eq!(value["id"], 7);
        assert_eq!(value["created_by"], 3);
        assert_eq!(value["created_at"], "2024-03-01T12:00:00Z");
        assert!(value.get("deleted_at").is_none());
        assert!(value.get("base").is_none());

        let back: AuditableModel = serde_json::from_value(value).expect("deserialise");
        assert_eq!(back, model);
    }

    #[rstest]
    fn touch_by_moves_updater(now: DateTime<Utc>) {
        let mut model = AuditableModel::new(1, Some(3), now);
        let later = now + chrono::Duration::minutes(5);
        model.touch_by(Some(4), later);
        assert_eq!(model.created_by, Some(3));
        assert_eq!(model.updated_by, Some(4));
        assert_eq!(model.base.timestamps.updated_at, later);
        assert_eq!(model.base.timestamps.created_at, now);
    }

    #[rstest]
    fn audit_entries_omit_unset_fields(now: DateTime<Utc>) {
        let entry = AuditLog::new(BaseModel::new(1, now), "update", "widget")
            .with_user(9)
            .with_resource_id("w-1")
            .with_change(Some(json!({"name": "old"})), Some(json!({"name": "new"})));
        let value = serde_json::to_value(&entry).expect("serialise");
        assert_eq!(value["action"], "update");
        assert_eq!(value["resource_id"], "w-1");
        assert_eq!(value["new_data"]["name"], "new");
        assert!(value.get("ip_address").is_none());
    }

    #[rstest]
    fn uuid_models_get_distinct_ids(now: DateTime<Utc>) {
        assert_ne!(UuidBaseModel::new(now).id, UuidBaseModel::new(now).id);
    }
}
