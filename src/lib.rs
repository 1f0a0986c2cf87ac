pub mod config;
pub mod db;
pub mod diff;
pub mod model;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod sql;
pub mod supabase;
