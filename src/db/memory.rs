//! In-process board store.
//!
//! Evaluates the same compiled predicates and write plans as the MongoDB
//! adapter, so handler behavior can be exercised without a server.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::query::{compile_filter, compile_update, WriteOp};
use super::{page_offset, with_deadline, Storage};
use crate::errors::AppError;
use crate::models::{Board, Filter, Member};

/// Board store backed by a lock-protected map.
pub struct MemoryStorage {
    boards: RwLock<HashMap<String, Board>>,
    timeout: Duration,
    latency: Duration,
}

impl MemoryStorage {
    pub fn new(timeout: Duration) -> Self {
        Self {
            boards: RwLock::new(HashMap::new()),
            timeout,
            latency: Duration::ZERO,
        }
    }

    /// Delay every operation, to exercise deadlines.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

/// Set-semantics add: a member is skipped when an identical entry already exists.
fn add_to_set(members: &mut Vec<Member>, incoming: Vec<Member>) {
    for member in incoming {
        let exists = members
            .iter()
            .any(|m| m.member_id == member.member_id && m.roles == member.roles);
        if !exists {
            members.push(Member {
                delete: false,
                ..member
            });
        }
    }
}

fn apply(boards: &mut HashMap<String, Board>, op: WriteOp) {
    match op {
        WriteOp::PullMembers {
            board_id,
            member_ids,
        } => {
            if let Some(board) = boards.get_mut(&board_id) {
                board.members.retain(|m| !member_ids.contains(&m.member_id));
            }
        }
        WriteOp::Upsert {
            board_id,
            set,
            set_on_insert,
            add_members,
        } => {
            let board = boards.entry(board_id.clone()).or_insert_with(|| Board {
                board_id,
                owner_id: set_on_insert.owner_id,
                created_at: Some(set_on_insert.created_at),
                ..Default::default()
            });
            if let Some(name) = set.name {
                board.name = name;
            }
            if let Some(metadata) = set.metadata {
                board.metadata = metadata;
            }
            add_to_set(&mut board.members, add_members);
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save(&self, board: Board) -> Result<(), AppError> {
        let operation = format!("board {} save", board.board_id);
        with_deadline(self.timeout, operation, async {
            self.simulate_latency().await;
            let ops = compile_update(&board);
            let mut boards = self.boards.write().await;
            for op in ops {
                apply(&mut boards, op);
            }
            tracing::debug!(board_id = %board.board_id, "board saved");
            Ok(())
        })
        .await
    }

    async fn delete(&self, board_id: &str) -> Result<(), AppError> {
        with_deadline(self.timeout, format!("board {} delete", board_id), async {
            self.simulate_latency().await;
            match self.boards.write().await.remove(board_id) {
                Some(_) => Ok(()),
                None => Err(AppError::NotFound(format!("Board {} not found", board_id))),
            }
        })
        .await
    }

    async fn find(
        &self,
        filter: &Filter,
        page_index: u64,
        page_size: u32,
    ) -> Result<Vec<Board>, AppError> {
        with_deadline(self.timeout, "boards find", async {
            self.simulate_latency().await;
            let predicate = compile_filter(filter);
            let boards = self.boards.read().await;

            let mut matched: Vec<&Board> = boards.values().filter(|b| predicate.matches(b)).collect();
            matched.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| a.board_id.cmp(&b.board_id))
            });

            let skip = usize::try_from(page_offset(page_index, page_size)).unwrap_or(usize::MAX);
            Ok(matched
                .into_iter()
                .skip(skip)
                .take(page_size as usize)
                .cloned()
                .collect())
        })
        .await
    }

    async fn count(&self, filter: &Filter) -> Result<u64, AppError> {
        with_deadline(self.timeout, "boards count", async {
            self.simulate_latency().await;
            let predicate = compile_filter(filter);
            let boards = self.boards.read().await;
            Ok(boards.values().filter(|b| predicate.matches(b)).count() as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    fn storage() -> MemoryStorage {
        MemoryStorage::new(Duration::from_secs(5))
    }

    fn member(id: &str, roles: &[&str], delete: bool) -> Member {
        Member {
            member_id: id.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            delete,
        }
    }

    fn created(id: &str, owner: &str, minutes_ago: i64) -> Board {
        Board {
            board_id: id.to_string(),
            owner_id: owner.to_string(),
            name: format!("Board {}", id),
            metadata: "{}".to_string(),
            created_at: Some(Utc::now() - ChronoDuration::minutes(minutes_ago)),
            members: vec![],
        }
    }

    fn update(id: &str, members: Vec<Member>) -> Board {
        Board {
            board_id: id.to_string(),
            members,
            ..Default::default()
        }
    }

    fn by_id(id: &str) -> Filter {
        Filter {
            board_ids: vec![id.to_string()],
            ..Default::default()
        }
    }

    async fn load(storage: &MemoryStorage, id: &str) -> Board {
        let mut found = storage.find(&by_id(id), 0, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        found.remove(0)
    }

    #[tokio::test]
    async fn test_repeated_add_is_idempotent() {
        let storage = storage();
        storage.save(created("b1", "u1", 0)).await.unwrap();

        for _ in 0..2 {
            storage
                .save(update("b1", vec![member("m1", &["r1"], false)]))
                .await
                .unwrap();
        }

        let board = load(&storage, "b1").await;
        assert_eq!(board.members, vec![member("m1", &["r1"], false)]);
    }

    #[tokio::test]
    async fn test_delete_then_readd_replaces_roles() {
        let storage = storage();
        storage.save(created("b1", "u1", 0)).await.unwrap();
        storage
            .save(update("b1", vec![member("m1", &["r1"], false)]))
            .await
            .unwrap();

        storage
            .save(update("b1", vec![member("m1", &[], true)]))
            .await
            .unwrap();
        storage
            .save(update("b1", vec![member("m1", &["r2"], false)]))
            .await
            .unwrap();

        let board = load(&storage, "b1").await;
        assert_eq!(board.members, vec![member("m1", &["r2"], false)]);
    }

    #[tokio::test]
    async fn test_role_change_replaces_entry_in_one_update() {
        let storage = storage();
        let mut board = created("b1", "u1", 0);
        board.members = vec![member("m1", &["r1"], false), member("m2", &["r1"], false)];
        storage.save(board).await.unwrap();

        storage
            .save(update("b1", vec![member("m1", &["r2"], false)]))
            .await
            .unwrap();

        let board = load(&storage, "b1").await;
        assert_eq!(
            board
                .members
                .iter()
                .filter(|m| m.member_id == "m1")
                .count(),
            1
        );
        assert_eq!(
            board.members,
            vec![member("m2", &["r1"], false), member("m1", &["r2"], false)]
        );
    }

    #[tokio::test]
    async fn test_deleted_member_not_readded_in_same_batch() {
        let storage = storage();
        let mut board = created("b1", "u1", 0);
        board.members = vec![member("m1", &["r1"], false)];
        storage.save(board).await.unwrap();

        storage
            .save(update(
                "b1",
                vec![member("m1", &["r2"], true), member("m2", &["r1"], false)],
            ))
            .await
            .unwrap();

        let board = load(&storage, "b1").await;
        assert_eq!(board.members, vec![member("m2", &["r1"], false)]);
    }

    #[tokio::test]
    async fn test_update_never_overwrites_owner_or_created_at() {
        let storage = storage();
        let original = created("b1", "u1", 30);
        let created_at = original.created_at;
        storage.save(original).await.unwrap();

        let mut renamed = update("b1", vec![]);
        renamed.name = "Renamed".to_string();
        storage.save(renamed).await.unwrap();

        let board = load(&storage, "b1").await;
        assert_eq!(board.owner_id, "u1");
        assert_eq!(board.created_at, created_at);
        assert_eq!(board.name, "Renamed");
        assert_eq!(board.metadata, "{}");
    }

    #[tokio::test]
    async fn test_update_of_missing_board_inserts_once() {
        let storage = storage();
        storage
            .save(update("b9", vec![member("m1", &["r1"], false)]))
            .await
            .unwrap();

        let board = load(&storage, "b9").await;
        assert!(board.owner_id.is_empty());
        assert!(board.created_at.is_some());
        assert_eq!(board.members.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let storage = storage();
        match storage.delete("nope").await {
            Err(AppError::NotFound(_)) => {}
            other => panic!("expected not found, got {:?}", other),
        }

        storage.save(created("b1", "u1", 0)).await.unwrap();
        storage.delete("b1").await.unwrap();
        assert!(storage.find(&by_id("b1"), 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_sorts_newest_first_and_paginates() {
        let storage = storage();
        for i in 0..5 {
            storage
                .save(created(&format!("b{}", i), "u1", i))
                .await
                .unwrap();
        }

        let first = storage.find(&Filter::default(), 0, 2).await.unwrap();
        let ids: Vec<_> = first.iter().map(|b| b.board_id.as_str()).collect();
        assert_eq!(ids, vec!["b0", "b1"]);

        let last = storage.find(&Filter::default(), 2, 2).await.unwrap();
        let ids: Vec<_> = last.iter().map(|b| b.board_id.as_str()).collect();
        assert_eq!(ids, vec!["b4"]);

        assert!(storage
            .find(&Filter::default(), 3, 2)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(storage.count(&Filter::default()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_find_orders_ties_by_board_id() {
        let storage = storage();
        let created_at = Utc::now();
        for id in ["b3", "b1", "b4", "b0", "b2"] {
            let mut board = created(id, "u1", 0);
            board.created_at = Some(created_at);
            storage.save(board).await.unwrap();
        }

        let mut seen = Vec::new();
        for index in 0..3 {
            let page = storage.find(&Filter::default(), index, 2).await.unwrap();
            seen.extend(page.into_iter().map(|b| b.board_id));
        }
        assert_eq!(seen, vec!["b0", "b1", "b2", "b3", "b4"]);
    }

    #[tokio::test]
    async fn test_count_applies_filter() {
        let storage = storage();
        storage.save(created("b1", "o1", 0)).await.unwrap();
        storage.save(created("b2", "o2", 0)).await.unwrap();
        storage
            .save(update("b2", vec![member("m1", &["viewer"], false)]))
            .await
            .unwrap();
        storage.save(created("b3", "o3", 0)).await.unwrap();

        let filter = Filter {
            owner_ids: vec!["o1".to_string()],
            member_ids: vec!["m1".to_string()],
            ..Default::default()
        };
        assert_eq!(storage.count(&filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let storage =
            MemoryStorage::new(Duration::from_millis(20)).with_latency(Duration::from_millis(500));

        match storage.count(&Filter::default()).await {
            Err(AppError::Timeout(msg)) => assert!(msg.starts_with("boards count")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
