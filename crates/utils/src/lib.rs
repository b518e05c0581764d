pub mod codes;
pub mod logging;
pub mod response;
pub mod text;
