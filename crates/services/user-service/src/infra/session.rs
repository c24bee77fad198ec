//! Session factory and database sessions.
//!
//! A session is one checked-out pool connection with an open transaction.
//! It is owned by whoever opened it and released exactly once: either
//! explicitly through [`Session::close`] or implicitly when dropped, which
//! covers cancellation.
//!
//! Two flavours exist:
//! - a bare session: nothing becomes durable unless `commit` is called;
//!   closing rolls back whatever is still pending.
//! - a transaction-demarcated session: a clean close commits pending work,
//!   an unclean close rolls it back.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use common::{AppError, AppResult};

/// How the session factory opens sessions for a unit of work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionMode {
    /// Plain session; durability is driven by explicit commits.
    #[default]
    Session,
    /// Transaction-demarcated session; a clean scope exit commits.
    Transaction,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Session => "session",
            SessionMode::Transaction => "transaction",
        }
    }
}

impl FromStr for SessionMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(SessionMode::Session),
            "transaction" => Ok(SessionMode::Transaction),
            other => Err(AppError::config(format!("Invalid session mode: {}", other))),
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scoped unit-of-work handle.
#[async_trait]
pub trait Session: Send + Sized {
    /// Make pending work durable. The next use starts a new transaction.
    async fn commit(&mut self) -> AppResult<()>;

    /// Discard pending work. The next use starts a new transaction.
    async fn rollback(&mut self) -> AppResult<()>;

    /// Release the session.
    ///
    /// `clean` tells whether the owning scope finished without error.
    async fn close(self, clean: bool) -> AppResult<()>;
}

/// Produces sessions bound to a connection pool.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: Session;

    /// Open a bare session.
    async fn open_session(&self) -> AppResult<Self::Session>;

    /// Open a transaction-demarcated session.
    async fn begin_transaction(&self) -> AppResult<Self::Session>;

    /// Open a session the way `mode` asks for.
    async fn open(&self, mode: SessionMode) -> AppResult<Self::Session> {
        match mode {
            SessionMode::Session => self.open_session().await,
            SessionMode::Transaction => self.begin_transaction().await,
        }
    }
}

/// Database session backed by a sea-orm transaction.
pub struct DbSession {
    db: DatabaseConnection,
    txn: Option<DatabaseTransaction>,
    demarcated: bool,
}

impl DbSession {
    async fn open(db: DatabaseConnection, demarcated: bool) -> AppResult<Self> {
        // Checking out the connection up front surfaces pool timeouts at open time.
        let txn = db.begin().await?;
        Ok(Self {
            db,
            txn: Some(txn),
            demarcated,
        })
    }

    /// The transaction all statements of this session run on.
    ///
    /// After a commit or rollback a new transaction is started lazily.
    pub async fn connection(&mut self) -> AppResult<&DatabaseTransaction> {
        let txn = match self.txn.take() {
            Some(txn) => txn,
            None => self.db.begin().await?,
        };
        Ok(self.txn.insert(txn))
    }

    /// Whether a transaction is currently open.
    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }
}

impl fmt::Debug for DbSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSession")
            .field("in_transaction", &self.in_transaction())
            .field("demarcated", &self.demarcated)
            .finish()
    }
}

#[async_trait]
impl Session for DbSession {
    async fn commit(&mut self) -> AppResult<()> {
        if let Some(txn) = self.txn.take() {
            txn.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> AppResult<()> {
        if let Some(txn) = self.txn.take() {
            txn.rollback().await?;
        }
        Ok(())
    }

    async fn close(self, clean: bool) -> AppResult<()> {
        let commit_pending = clean && self.demarcated;
        match self.txn {
            Some(txn) if commit_pending => txn.commit().await?,
            Some(txn) => txn.rollback().await?,
            None => {}
        }
        Ok(())
    }
}

/// Session factory over a sea-orm connection pool.
#[derive(Clone)]
pub struct SessionMaker {
    db: DatabaseConnection,
}

impl SessionMaker {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionFactory for SessionMaker {
    type Session = DbSession;

    async fn open_session(&self) -> AppResult<DbSession> {
        DbSession::open(self.db.clone(), false).await
    }

    async fn begin_transaction(&self) -> AppResult<DbSession> {
        DbSession::open(self.db.clone(), true).await
    }
}
