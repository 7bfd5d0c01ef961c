pub mod backup;
pub mod books;
pub mod core;
pub mod issues;
