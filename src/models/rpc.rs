//! Wire shapes for the board RPC surface.
//!
//! Field names mirror the protobuf contract (snake_case). Absent scalars
//! decode to empty strings and absent lists to empty vectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A member entry on a create request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBoardMember {
    #[serde(default)]
    pub member_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Request body for `CreateBoard`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBoardRequest {
    #[serde(default)]
    pub board_id: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub members: Vec<CreateBoardMember>,
}

/// A member delta entry on an update request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBoardMember {
    #[serde(default)]
    pub member_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Marks the member for removal rather than addition.
    #[serde(default)]
    pub delete: bool,
}

/// Request body for `UpdateBoard`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBoardRequest {
    #[serde(default)]
    pub board_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub members: Vec<UpdateBoardMember>,
}

/// Request body for `DeleteBoard`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteBoardRequest {
    #[serde(default)]
    pub board_id: String,
}

/// Request body for `GetBoards`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardsRequest {
    /// Zero-based page number.
    #[serde(default)]
    pub page_index: u64,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub board_ids: Vec<String>,
    #[serde(default)]
    pub owner_ids: Vec<String>,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

/// A member as returned by `GetBoards`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardMemberResponse {
    pub member_id: String,
    pub roles: Vec<String>,
}

/// A board as returned by `GetBoards`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardResponse {
    pub board_id: String,
    pub owner_id: String,
    pub name: String,
    pub metadata: String,
    /// RFC 3339, UTC.
    pub created_at: DateTime<Utc>,
    pub members: Vec<BoardMemberResponse>,
}

/// Response body for `GetBoards`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardsResponse {
    pub total: u64,
    pub boards: Vec<BoardResponse>,
}

/// Payload of operations that return nothing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Empty {}
