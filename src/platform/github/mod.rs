pub mod auth;
pub mod client;
pub mod mapper;

pub use client::GitHubProvider;
