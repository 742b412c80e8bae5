pub mod follows;
pub mod notebooks;
pub mod offers;
pub mod questions;
pub mod tests;
pub mod users;
