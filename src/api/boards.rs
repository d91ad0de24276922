//! Board RPC endpoints.

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use super::{decode, success, ApiResult};
use crate::db::{page_offset, Storage};
use crate::errors::AppError;
use crate::models::{
    Board, BoardsRequest, BoardsResponse, CreateBoardRequest, DeleteBoardRequest, Empty, Filter,
    UpdateBoardRequest,
};
use crate::AppState;

/// POST /rpc/board.v1.Board/CreateBoard - Create a board.
pub async fn create_board(
    State(state): State<AppState>,
    payload: Result<Json<CreateBoardRequest>, JsonRejection>,
) -> ApiResult<Empty> {
    let request = decode(payload)?;
    state.validator.check(&request)?;

    let board = Board::from_create(request);
    tracing::info!(board_id = %board.board_id, owner_id = %board.owner_id, "create board");
    state.storage.save(board).await?;

    success(Empty {})
}

/// POST /rpc/board.v1.Board/UpdateBoard - Apply a partial update and member delta.
pub async fn update_board(
    State(state): State<AppState>,
    payload: Result<Json<UpdateBoardRequest>, JsonRejection>,
) -> ApiResult<Empty> {
    let request = decode(payload)?;
    state.validator.check(&request)?;

    let board = Board::from_update(request);
    tracing::info!(board_id = %board.board_id, members = board.members.len(), "update board");
    state.storage.save(board).await?;

    success(Empty {})
}

/// POST /rpc/board.v1.Board/DeleteBoard - Delete a board.
pub async fn delete_board(
    State(state): State<AppState>,
    payload: Result<Json<DeleteBoardRequest>, JsonRejection>,
) -> ApiResult<Empty> {
    let request = decode(payload)?;
    state.validator.check(&request)?;

    state.storage.delete(&request.board_id).await?;
    tracing::info!(board_id = %request.board_id, "board deleted");

    success(Empty {})
}

/// POST /rpc/board.v1.Board/GetBoards - List one page of boards.
pub async fn get_boards(
    State(state): State<AppState>,
    payload: Result<Json<BoardsRequest>, JsonRejection>,
) -> ApiResult<BoardsResponse> {
    let request = decode(payload)?;
    state.validator.check(&request)?;

    success(list_boards(state.storage.as_ref(), &request).await?)
}

/// Whether the page alone cannot tell us the total.
///
/// A full page may be followed by more records, unless the caller scoped the
/// query to explicit board ids. An empty page past the first gives no offset to
/// derive from.
fn needs_count(request: &BoardsRequest, returned: usize) -> bool {
    let full_page = returned as u64 == u64::from(request.page_size);
    let past_end = returned == 0 && request.page_index > 0;
    (request.board_ids.is_empty() && full_page) || past_end
}

/// Fetch a page and decide the total, counting only when it cannot be derived.
///
/// An uncounted total is `page_index * page_size + len`. On the first page
/// that is the page length. A short page past index 0 is the last page, so the
/// offset-derived value is the true total.
pub async fn list_boards(
    storage: &dyn Storage,
    request: &BoardsRequest,
) -> Result<BoardsResponse, AppError> {
    let filter = Filter::from(request);

    let boards = storage
        .find(&filter, request.page_index, request.page_size)
        .await?;

    let total = if needs_count(request, boards.len()) {
        storage.count(&filter).await?
    } else {
        page_offset(request.page_index, request.page_size) + boards.len() as u64
    };

    Ok(BoardsResponse {
        total,
        boards: boards.into_iter().map(Board::into_response).collect(),
    })
}
