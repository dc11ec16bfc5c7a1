pub mod activity;
pub mod entity;
pub mod schedule;
pub mod sync_log;
