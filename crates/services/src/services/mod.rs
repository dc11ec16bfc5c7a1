pub mod overlap;
pub mod rag_sync;
pub mod sync_status;
pub mod vector_index;
pub mod webhook;
