pub mod outbound;
pub mod postgres;

pub use outbound::{LogOutbound, Outbound};
pub use postgres::PostgresStore;

#[cfg(test)]
pub use outbound::MockOutbound;
