pub mod health;
pub mod index;
pub mod send;
pub mod ws;
