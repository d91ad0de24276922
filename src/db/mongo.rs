//! MongoDB board store.
//!
//! Renders compiled predicates and write plans to BSON. Saves go through the
//! server `update` command so the pull and the upsert travel as one ordered
//! bulk write.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::Deserialize;

use super::query::{compile_filter, compile_update, Predicate, WriteOp};
use super::{page_offset, with_deadline, Storage};
use crate::errors::AppError;
use crate::models::{Board, Filter, Member};

/// Collection holding one document per board.
pub const COLLECTION: &str = "boards";

/// Stored member layout.
#[derive(Debug, Deserialize)]
struct MemberDocument {
    #[serde(default)]
    member_id: String,
    #[serde(default)]
    roles: Vec<String>,
}

/// Stored board layout. Missing fields decode to their empty values.
#[derive(Debug, Deserialize)]
struct BoardDocument {
    #[serde(rename = "_id")]
    board_id: String,
    #[serde(default)]
    owner_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    metadata: String,
    #[serde(default)]
    created_at: Option<bson::DateTime>,
    #[serde(default)]
    members: Vec<MemberDocument>,
}

impl From<BoardDocument> for Board {
    fn from(doc: BoardDocument) -> Self {
        Board {
            board_id: doc.board_id,
            owner_id: doc.owner_id,
            name: doc.name,
            metadata: doc.metadata,
            created_at: doc
                .created_at
                .and_then(|dt| DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())),
            members: doc
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
}

/// Render a compiled predicate as a MongoDB query document.
/// Newest first; ties fall back to `_id` so pages never overlap.
fn page_sort() -> Document {
    doc! { "created_at": -1, "_id": 1 }
}

pub fn filter_document(predicate: &Predicate) -> Document {
    match predicate {
        Predicate::All => Document::new(),
        Predicate::In { field, values } => {
            let mut query = Document::new();
            query.insert(field.path(), doc! { "$in": values.clone() });
            query
        }
        Predicate::Or(clauses) => {
            doc! { "$or": clauses.iter().map(filter_document).collect::<Vec<_>>() }
        }
        Predicate::And(clauses) => {
            doc! { "$and": clauses.iter().map(filter_document).collect::<Vec<_>>() }
        }
    }
}

fn member_document(member: &Member) -> Document {
    doc! {
        "member_id": member.member_id.as_str(),
        "roles": member.roles.clone(),
    }
}

/// Render a write op as one statement of the `update` command.
pub fn write_statement(op: &WriteOp) -> Document {
    match op {
        WriteOp::PullMembers {
            board_id,
            member_ids,
        } => doc! {
            "q": { "_id": board_id.as_str() },
            "u": {
                "$pull": {
                    "members": { "member_id": { "$in": member_ids.clone() } }
                }
            },
        },
        WriteOp::Upsert {
            board_id,
            set,
            set_on_insert,
            add_members,
        } => {
            let mut update = Document::new();

            if !set.is_empty() {
                let mut fields = Document::new();
                if let Some(name) = &set.name {
                    fields.insert("name", name.as_str());
                }
                if let Some(metadata) = &set.metadata {
                    fields.insert("metadata", metadata.as_str());
                }
                update.insert("$set", fields);
            }

            update.insert(
                "$setOnInsert",
                doc! {
                    "owner_id": set_on_insert.owner_id.as_str(),
                    "created_at": bson::DateTime::from_millis(
                        set_on_insert.created_at.timestamp_millis()
                    ),
                },
            );
            update.insert(
                "$addToSet",
                doc! {
                    "members": {
                        "$each": add_members.iter().map(member_document).collect::<Vec<_>>()
                    }
                },
            );

            doc! {
                "q": { "_id": board_id.as_str() },
                "u": update,
                "upsert": true,
            }
        }
    }
}

/// Fail when the `update` command reply carries write or write-concern errors.
fn check_update_reply(reply: &Document) -> Result<(), AppError> {
    if let Ok(errors) = reply.get_array("writeErrors") {
        if let Some(Bson::Document(first)) = errors.first() {
            let message = first.get_str("errmsg").unwrap_or("unknown write error");
            return Err(AppError::Store(format!(
                "bulk write failed ({} errors): {}",
                errors.len(),
                message
            )));
        }
    }
    if let Ok(concern) = reply.get_document("writeConcernError") {
        let message = concern.get_str("errmsg").unwrap_or("unknown write concern error");
        return Err(AppError::Store(format!("bulk write concern failed: {}", message)));
    }
    Ok(())
}

/// Board store backed by a MongoDB collection.
pub struct MongoStorage {
    db: Database,
    boards: Collection<BoardDocument>,
    timeout: Duration,
}

impl MongoStorage {
    /// Connect and verify the server answers within the deadline.
    pub async fn connect(uri: &str, database: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = with_deadline(timeout, "store connect", async {
            Ok::<_, AppError>(Client::with_uri_str(uri).await?)
        })
        .await?;
        let db = client.database(database);

        with_deadline(timeout, "store ping", async {
            db.run_command(doc! { "ping": 1 }).await?;
            Ok::<_, AppError>(())
        })
        .await?;

        tracing::info!(database = database, "Connected to document store");

        Ok(Self {
            boards: db.collection(COLLECTION),
            db,
            timeout,
        })
    }

    /// Create the compound index backing owner/time/member queries.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        let index = IndexModel::builder()
            .keys(doc! {
                "owner_id": 1,
                "created_at": 1,
                "members.member_id": 1,
            })
            .build();

        let result = with_deadline(self.timeout, "boards index create", async {
            Ok::<_, AppError>(self.boards.create_index(index).await?)
        })
        .await?;

        tracing::info!(
            collection = COLLECTION,
            name = %result.index_name,
            "index created"
        );
        Ok(())
    }
}

#[async_trait]
impl Storage for MongoStorage {
    async fn save(&self, board: Board) -> Result<(), AppError> {
        let ops = compile_update(&board);

        if let Some(WriteOp::PullMembers { member_ids, .. }) = ops.first() {
            tracing::info!(board_id = %board.board_id, members = ?member_ids, "pull board's members");
        }

        let command = doc! {
            "update": COLLECTION,
            "updates": ops.iter().map(write_statement).collect::<Vec<_>>(),
            "ordered": true,
        };

        let reply = with_deadline(
            self.timeout,
            format!("board {} update", board.board_id),
            async {
                let reply = self.db.run_command(command).await?;
                check_update_reply(&reply)?;
                Ok::<_, AppError>(reply)
            },
        )
        .await?;

        tracing::info!(
            board_id = %board.board_id,
            matched = reply.get_i32("n").unwrap_or_default(),
            modified = reply.get_i32("nModified").unwrap_or_default(),
            "board updated"
        );
        Ok(())
    }

    async fn delete(&self, board_id: &str) -> Result<(), AppError> {
        tracing::debug!(board_id = board_id, "board delete");

        let result = with_deadline(self.timeout, format!("board {} delete", board_id), async {
            Ok::<_, AppError>(self.boards.delete_one(doc! { "_id": board_id }).await?)
        })
        .await?;

        if result.deleted_count == 0 {
            return Err(AppError::NotFound(format!("Board {} not found", board_id)));
        }

        tracing::debug!(board_id = board_id, "board deleted");
        Ok(())
    }

    async fn find(
        &self,
        filter: &Filter,
        page_index: u64,
        page_size: u32,
    ) -> Result<Vec<Board>, AppError> {
        let query = filter_document(&compile_filter(filter));

        let documents: Vec<BoardDocument> = with_deadline(self.timeout, "boards find", async {
            let cursor = self
                .boards
                .find(query)
                .sort(page_sort())
                .skip(page_offset(page_index, page_size))
                .limit(i64::from(page_size))
                .await?;
            Ok::<_, AppError>(cursor.try_collect().await?)
        })
        .await?;

        Ok(documents.into_iter().map(Board::from).collect())
    }

    async fn count(&self, filter: &Filter) -> Result<u64, AppError> {
        let query = filter_document(&compile_filter(filter));

        with_deadline(self.timeout, "boards count", async {
            Ok::<_, AppError>(self.boards.count_documents(query).await?)
        })
        .await
    }
}
