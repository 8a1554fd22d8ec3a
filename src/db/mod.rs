pub mod files;
pub mod pool;

pub use files::{FileRepository, PgFileRepository};
pub use pool::create_pool;
