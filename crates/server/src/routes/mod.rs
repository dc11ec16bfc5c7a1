pub mod activities;
pub mod rag;
pub mod schedules;
