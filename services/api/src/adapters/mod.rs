pub mod db;
pub mod mock_db;
pub mod notify;

pub use db::PgStore;
pub use mock_db::MemStore;
pub use notify::TracingNotifier;
