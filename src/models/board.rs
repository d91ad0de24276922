//! Board domain model and conversions from/to the wire shapes.

use chrono::{DateTime, Utc};

use super::rpc::{
    BoardMemberResponse, BoardResponse, BoardsRequest, CreateBoardRequest, UpdateBoardRequest,
};

/// A user's role grants on a board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Member {
    pub member_id: String,
    pub roles: Vec<String>,
    /// Removal intent on incoming updates. Never persisted.
    pub delete: bool,
}

/// A named workspace with an owner and members.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    pub board_id: String,
    /// Empty on the update path; only written when the document is inserted.
    pub owner_id: String,
    pub name: String,
    pub metadata: String,
    /// `None` on the update path; only written when the document is inserted.
    pub created_at: Option<DateTime<Utc>>,
    pub members: Vec<Member>,
}

/// Narrows a board listing. Empty sets are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub board_ids: Vec<String>,
    pub owner_ids: Vec<String>,
    pub member_ids: Vec<String>,
}

impl Board {
    /// Build a board from a create request, stamping `created_at` with the current UTC time.
    pub fn from_create(request: CreateBoardRequest) -> Self {
        Board {
            board_id: request.board_id,
            owner_id: request.owner_id,
            name: request.name,
            metadata: request.metadata,
            created_at: Some(Utc::now()),
            members: request
                .members
                .into_iter()
                .map(|m| Member {
                    member_id: m.member_id,
                    roles: m.roles,
                    delete: false,
                })
                .collect(),
        }
    }

    /// Build a partial board from an update request.
    ///
    /// `owner_id` and `created_at` stay empty so they can never overwrite stored values.
    pub fn from_update(request: UpdateBoardRequest) -> Self {
        Board {
            board_id: request.board_id,
            owner_id: String::new(),
            name: request.name,
            metadata: request.metadata,
            created_at: None,
            members: request
                .members
                .into_iter()
                .map(|m| Member {
                    member_id: m.member_id,
                    roles: m.roles,
                    delete: m.delete,
                })
                .collect(),
        }
    }

    pub fn into_response(self) -> BoardResponse {
        BoardResponse {
            board_id: self.board_id,
            owner_id: self.owner_id,
            name: self.name,
            metadata: self.metadata,
            created_at: self.created_at.unwrap_or_default(),
            members: self
                .members
                .into_iter()
                .map(|m| BoardMemberResponse {
                    member_id: m.member_id,
                    roles: m.roles,
                })
                .collect(),
        }
    }

    /// Every member id the save touches. Stored entries for these ids are
    /// pulled before the non-deleted members are added back, which keeps one
    /// entry per member id.
    pub fn replaced_member_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.member_id.clone()).collect()
    }

    /// Members not flagged for deletion.
    pub fn added_members(&self) -> Vec<Member> {
        self.members
            .iter()
            .filter(|m| !m.delete)
            .cloned()
            .collect()
    }
}

impl From<&BoardsRequest> for Filter {
    fn from(request: &BoardsRequest) -> Self {
        Filter {
            board_ids: request.board_ids.clone(),
            owner_ids: request.owner_ids.clone(),
            member_ids: request.member_ids.clone(),
        }
    }
}
