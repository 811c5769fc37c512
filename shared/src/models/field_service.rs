//! Field-service work orders and installation checklists

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An installation job assigned to a technician
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsmOrder {
    pub id: i64,
    pub name: String,
    pub technician_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub stage: FsmStage,
    pub install_lat: Option<f64>,
    pub install_lon: Option<f64>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsmStage {
    New,
    Assigned,
    InProgress,
    Done,
    Cancelled,
}

impl FsmStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FsmStage::New => "new",
            FsmStage::Assigned => "assigned",
            FsmStage::InProgress => "in_progress",
            FsmStage::Done => "done",
            FsmStage::Cancelled => "cancelled",
        }
    }

    /// Accepts the stage code or its display name ("In Progress")
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "new" => Some(FsmStage::New),
            "assigned" => Some(FsmStage::Assigned),
            "in_progress" => Some(FsmStage::InProgress),
            "done" => Some(FsmStage::Done),
            "cancelled" | "canceled" => Some(FsmStage::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: i64,
    pub fsm_order_id: i64,
    pub name: String,
    pub is_done: bool,
    pub done_by: Option<i64>,
    pub done_date: Option<DateTime<Utc>>,
}

/// Done flag plus who/when, as it should be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoneState {
    pub is_done: bool,
    pub done_by: Option<i64>,
    pub done_date: Option<DateTime<Utc>>,
}

impl DoneState {
    pub fn pending() -> Self {
        Self {
            is_done: false,
            done_by: None,
            done_date: None,
        }
    }

    /// Mark done or not done. An existing done date is kept; a missing one is stamped.
    pub fn mark(&self, is_done: bool, user_id: i64, now: DateTime<Utc>) -> DoneState {
        if is_done {
            DoneState {
                is_done: true,
                done_by: Some(user_id),
                done_date: self.done_date.or(Some(now)),
            }
        } else {
            DoneState::pending()
        }
    }
}

impl ChecklistItem {
    pub fn done_state(&self) -> DoneState {
        DoneState {
            is_done: self.is_done,
            done_by: self.done_by,
            done_date: self.done_date,
        }
    }
}

/// Attachment metadata (payload bytes are served separately)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInfo {
    pub id: i64,
    pub name: String,
    pub mimetype: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}
