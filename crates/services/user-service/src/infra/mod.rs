//! Infrastructure layer - database pool, sessions and the unit of work.

mod db;
pub mod migrations;
pub mod session;
pub mod unit_of_work;

pub use db::{connect_options, Database};
pub use migrations::Migrator;
pub use session::{DbSession, Session, SessionFactory, SessionMaker, SessionMode};
pub use unit_of_work::{Detached, SessionOptions, UnitOfWork, Wrapped};
