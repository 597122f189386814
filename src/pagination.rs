//! Page selection over an ordered message list
//!
//! Without a cursor the page is the newest window, still in ascending order.
//! With a cursor the page is the next `page_size` messages after it.

use crate::error::{ChatError, Result};
use crate::model::Message;

/// Maximum number of messages returned per list request
pub const PAGE_SIZE: usize = 20;

/// Select one page from `ordered` (ascending by creation).
///
/// `from_id` is an exclusive lower bound; an id not present in `ordered`
/// fails with `CursorNotFound`.
pub fn page(ordered: Vec<Message>, from_id: Option<&str>, page_size: usize) -> Result<Vec<Message>> {
    match from_id {
        None => {
            let skip = ordered.len().saturating_sub(page_size);
            Ok(ordered.into_iter().skip(skip).collect())
        }
        Some(cursor) => {
            let pos = ordered
                .iter()
                .position(|m| m.id == cursor)
                .ok_or_else(|| ChatError::CursorNotFound(cursor.to_string()))?;
            Ok(ordered.into_iter().skip(pos + 1).take(page_size).collect())
        }
    }
}
