//! SurrealDB repository implementations.

mod account;
mod grant;

pub use account::SurrealAccountRepository;
pub use grant::SurrealGrantStore;
