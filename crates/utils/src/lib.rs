pub mod response;
pub mod text;
pub mod time;
