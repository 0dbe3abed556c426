pub mod app;
pub mod authz;
pub mod category;
pub mod clock;
pub mod codes;
pub mod db;
pub mod docs;
pub mod errors;
pub mod events;
pub mod jwt;
pub mod memory;
pub mod menu;
pub mod models;
pub mod routes;
pub mod tree;
pub mod utils;

// Re-export commonly used items for tests
pub use app::create_app;
