mod articles;
mod interests;
mod schema;
mod search;
mod types;
mod views;

pub use schema::Database;
pub use types::{fold_case, Article, DatabaseError, Interest, NewArticle, MAX_SOURCE_LEN};
