//! Unit of Work - session-scoped execution of business operations.
//!
//! A [`UnitOfWork`] owns a [`SessionFactory`] and a set of [`SessionOptions`].
//! Operations that need a database session receive it as an explicit
//! `&mut` argument. When the caller already holds a session it is handed
//! through untouched; otherwise the unit of work opens one, runs the
//! operation, commits or rolls back according to its options and always
//! releases the session afterwards.
//!
//! Lifecycle of a session opened here:
//!
//! ```text
//! open (mode) -> op(&mut session) -> [commit if autocommit]
//!                       |                    |
//!                     error <----------------+
//!                       |
//!             [rollback if autorollback]
//!                       |
//!                 close(clean) -> result
//! ```
//!
//! Errors from the operation are returned unchanged. A failure while
//! committing, rolling back or closing is attached to the primary error
//! with [`AppError::with_cleanup_failure`] instead of replacing it.

use std::future::Future;

use futures::future::BoxFuture;
use tracing::Instrument;

use common::{AppError, AppResult, DatabaseConfig};

use super::session::{Session, SessionFactory, SessionMode};

/// Default label of the injected session argument
pub const DEFAULT_PARAM_NAME: &str = "session";

/// Behaviour of a [`UnitOfWork`] around the sessions it opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// How sessions are opened
    pub mode: SessionMode,
    /// Roll back when the operation fails
    pub autorollback: bool,
    /// Commit when the operation succeeds
    pub autocommit: bool,
    /// Name of the injected session argument, recorded on the tracing span
    pub param_name: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            mode: SessionMode::Session,
            autorollback: true,
            autocommit: false,
            param_name: DEFAULT_PARAM_NAME.to_string(),
        }
    }
}

impl SessionOptions {
    /// Options for a mode given by name. Unknown names are a configuration error.
    pub fn with_mode(mode: &str) -> AppResult<Self> {
        Ok(Self {
            mode: mode.parse()?,
            ..Self::default()
        })
    }

    /// Options derived from database settings.
    pub fn from_config(config: &DatabaseConfig) -> AppResult<Self> {
        Self::with_mode(&config.session_mode)
    }

    pub fn autocommit(mut self, enabled: bool) -> Self {
        self.autocommit = enabled;
        self
    }

    pub fn autorollback(mut self, enabled: bool) -> Self {
        self.autorollback = enabled;
        self
    }

    pub fn param_name(mut self, name: impl Into<String>) -> Self {
        self.param_name = name.into();
        self
    }
}

/// Runs operations inside database sessions.
pub struct UnitOfWork<F> {
    factory: F,
    options: SessionOptions,
}

impl<F: SessionFactory> UnitOfWork<F> {
    pub fn new(factory: F, options: SessionOptions) -> Self {
        Self { factory, options }
    }

    /// Plain sessions with default options.
    pub fn session(factory: F) -> Self {
        Self::new(factory, SessionOptions::default())
    }

    /// Transaction-demarcated sessions with default options.
    pub fn transaction(factory: F) -> Self {
        Self::new(
            factory,
            SessionOptions {
                mode: SessionMode::Transaction,
                ..SessionOptions::default()
            },
        )
    }

    /// Build from database settings, failing fast on an invalid session mode.
    pub fn from_config(factory: F, config: &DatabaseConfig) -> AppResult<Self> {
        Ok(Self::new(factory, SessionOptions::from_config(config)?))
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Run `op` with a session.
    ///
    /// With `Some(session)` the operation runs directly on the caller's
    /// session and nothing else happens. With `None` a new session is
    /// opened and governed by this unit of work.
    pub async fn run<T, Op>(&self, session: Option<&mut F::Session>, op: Op) -> AppResult<T>
    where
        Op: for<'s> FnOnce(&'s mut F::Session) -> BoxFuture<'s, AppResult<T>> + Send,
        T: Send,
    {
        match session {
            Some(session) => op(session).await,
            None => self.run_scoped(op).await,
        }
    }

    /// Wrap an operation that takes a session.
    pub fn wrap<Op>(&self, op: Op) -> Wrapped<'_, F, Op> {
        Wrapped { uow: self, op }
    }

    /// Wrap an operation that takes no session. Calling it never opens one.
    pub fn wrap_detached<Op>(&self, op: Op) -> Detached<Op> {
        Detached { op }
    }

    async fn run_scoped<T, Op>(&self, op: Op) -> AppResult<T>
    where
        Op: for<'s> FnOnce(&'s mut F::Session) -> BoxFuture<'s, AppResult<T>> + Send,
        T: Send,
    {
        let span = tracing::trace_span!(
            "unit_of_work",
            param = %self.options.param_name,
            mode = %self.options.mode,
        );

        async move {
            // Dropping this future drops `session`, which releases it.
            let mut session = self.factory.open(self.options.mode).await?;
            let outcome = self.govern(&mut session, op).await;
            let released = session.close(outcome.is_ok()).await;
            settle(outcome, released)
        }
        .instrument(span)
        .await
    }

    async fn govern<T, Op>(&self, session: &mut F::Session, op: Op) -> AppResult<T>
    where
        Op: for<'s> FnOnce(&'s mut F::Session) -> BoxFuture<'s, AppResult<T>> + Send,
        T: Send,
    {
        let outcome = match op(&mut *session).await {
            Ok(value) if self.options.autocommit => session.commit().await.map(|()| value),
            other => other,
        };

        match outcome {
            Err(err) if self.options.autorollback => match session.rollback().await {
                Ok(()) => Err(err),
                Err(cleanup) => Err(err.with_cleanup_failure(cleanup)),
            },
            other => other,
        }
    }
}

/// Combine the operation outcome with the release result.
fn settle<T>(outcome: AppResult<T>, released: AppResult<()>) -> AppResult<T> {
    match (outcome, released) {
        (outcome, Ok(())) => outcome,
        (Ok(_), Err(release_err)) => Err(release_err),
        (Err(err), Err(release_err)) => Err(err.with_cleanup_failure(release_err)),
    }
}

/// A session-taking operation bound to a [`UnitOfWork`].
pub struct Wrapped<'u, F, Op> {
    uow: &'u UnitOfWork<F>,
    op: Op,
}

impl<'u, F: SessionFactory, Op> Wrapped<'u, F, Op> {
    /// Call with a session opened and governed by the unit of work.
    pub async fn call<A, T>(&self, args: A) -> AppResult<T>
    where
        Op: for<'s> Fn(&'s mut F::Session, A) -> BoxFuture<'s, AppResult<T>> + Sync,
        A: Send,
        T: Send,
    {
        self.uow.run(None, |session| (self.op)(session, args)).await
    }

    /// Call on the caller's session. The unit of work stays out of the way.
    pub async fn call_with<A, T>(&self, session: &mut F::Session, args: A) -> AppResult<T>
    where
        Op: for<'s> Fn(&'s mut F::Session, A) -> BoxFuture<'s, AppResult<T>>,
    {
        (self.op)(session, args).await
    }
}

/// An operation without a session parameter.
pub struct Detached<Op> {
    op: Op,
}

impl<Op> Detached<Op> {
    pub async fn call<A, T, Fut>(&self, args: A) -> AppResult<T>
    where
        Op: Fn(A) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        (self.op)(args).await
    }
}

/// Run a block inside a session opened by the given unit of work.
///
/// ```rust,ignore
/// let user = with_session!(uow, |session| users::create(session, NewUser::default()).await)?;
/// ```
#[macro_export]
macro_rules! with_session {
    ($uow:expr, |$session:ident| $body:expr) => {
        $uow.run(None, |$session| Box::pin(async move { $body })).await
    };
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    /// Call counters shared by a factory and every session it opens.
    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
        closes: AtomicUsize,
        released: AtomicUsize,
        events: Mutex<Vec<&'static str>>,
    }

    impl Counters {
        fn record(&self, event: &'static str) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().clone()
        }

        fn get(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    #[derive(Clone, Copy, Default)]
    struct Failures {
        open: bool,
        commit: bool,
        rollback: bool,
        close: bool,
    }

    struct TestSession {
        label: &'static str,
        demarcated: bool,
        failures: Failures,
        counters: Arc<Counters>,
    }

    impl Drop for TestSession {
        fn drop(&mut self) {
            self.counters.released.fetch_add(1, Ordering::SeqCst);
            self.counters.record("release");
        }
    }

    #[async_trait]
    impl Session for TestSession {
        async fn commit(&mut self) -> AppResult<()> {
            self.counters.commits.fetch_add(1, Ordering::SeqCst);
            self.counters.record("commit");
            if self.failures.commit {
                return Err(AppError::internal("commit failed"));
            }
            Ok(())
        }

        async fn rollback(&mut self) -> AppResult<()> {
            self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
            self.counters.record("rollback");
            if self.failures.rollback {
                return Err(AppError::internal("rollback failed"));
            }
            Ok(())
        }

        async fn close(self, clean: bool) -> AppResult<()> {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            self.counters.record(match (self.demarcated, clean) {
                (true, true) => "close_commit",
                (_, true) => "close_clean",
                (_, false) => "close_dirty",
            });
            if self.failures.close {
                return Err(AppError::internal("release failed"));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct TestFactory {
        counters: Arc<Counters>,
        failures: Failures,
    }

    impl TestFactory {
        fn failing(failures: Failures) -> Self {
            Self {
                failures,
                ..Self::default()
            }
        }

        fn counters(&self) -> Arc<Counters> {
            self.counters.clone()
        }

        fn detached_session(&self, label: &'static str) -> TestSession {
            TestSession {
                label,
                demarcated: false,
                failures: self.failures,
                counters: self.counters.clone(),
            }
        }

        fn make(&self, demarcated: bool, event: &'static str) -> AppResult<TestSession> {
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            self.counters.record(event);
            if self.failures.open {
                return Err(AppError::internal("pool timed out"));
            }
            Ok(TestSession {
                label: "scoped",
                demarcated,
                failures: self.failures,
                counters: self.counters.clone(),
            })
        }
    }

    #[async_trait]
    impl SessionFactory for TestFactory {
        type Session = TestSession;

        async fn open_session(&self) -> AppResult<TestSession> {
            self.make(false, "open")
        }

        async fn begin_transaction(&self) -> AppResult<TestSession> {
            self.make(true, "begin")
        }
    }

    fn uow(factory: TestFactory, options: SessionOptions) -> UnitOfWork<TestFactory> {
        UnitOfWork::new(factory, options)
    }

    fn succeed(session: &mut TestSession) -> BoxFuture<'_, AppResult<&'static str>> {
        Box::pin(async move { Ok(session.label) })
    }

    fn fail(_session: &mut TestSession) -> BoxFuture<'_, AppResult<&'static str>> {
        Box::pin(async { Err(AppError::validation("boom")) })
    }

    fn touch(session: &mut TestSession) -> BoxFuture<'_, AppResult<()>> {
        session.counters.record("op");
        Box::pin(async { Ok(()) })
    }

    fn hang(_session: &mut TestSession) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(futures::future::pending())
    }

    fn greet(session: &mut TestSession, name: String) -> BoxFuture<'_, AppResult<String>> {
        Box::pin(async move { Ok(format!("{} via {}", name, session.label)) })
    }

    #[tokio::test]
    async fn test_detached_operation_never_opens_a_session() {
        let factory = TestFactory::default();
        let counters = factory.counters();
        let uow = UnitOfWork::session(factory);

        let double = uow.wrap_detached(|n: u32| async move { Ok::<_, AppError>(n * 2) });

        assert_eq!(double.call(21).await.unwrap(), 42);
        assert_eq!(double.call(2).await.unwrap(), 4);
        assert_eq!(Counters::get(&counters.opened), 0);
        assert!(counters.events().is_empty());
    }

    #[tokio::test]
    async fn test_scoped_success_opens_and_releases_once() {
        let factory = TestFactory::default();
        let counters = factory.counters();
        let uow = uow(factory, SessionOptions::default());

        let label = assert_ok!(uow.run(None, succeed).await);

        assert_eq!(label, "scoped");
        assert_eq!(Counters::get(&counters.opened), 1);
        assert_eq!(Counters::get(&counters.closes), 1);
        assert_eq!(Counters::get(&counters.released), 1);
        assert_eq!(Counters::get(&counters.commits), 0);
        assert_eq!(counters.events(), vec!["open", "close_clean", "release"]);
    }

    #[tokio::test]
    async fn test_scoped_failure_still_releases_once() {
        let factory = TestFactory::default();
        let counters = factory.counters();
        let uow = uow(factory, SessionOptions::default());

        assert_err!(uow.run(None, fail).await);

        assert_eq!(Counters::get(&counters.opened), 1);
        assert_eq!(Counters::get(&counters.released), 1);
    }

    #[tokio::test]
    async fn test_autocommit_commits_once_before_release() {
        let factory = TestFactory::default();
        let counters = factory.counters();
        let uow = uow(factory, SessionOptions::default().autocommit(true));

        assert_ok!(uow.run(None, succeed).await);

        assert_eq!(Counters::get(&counters.commits), 1);
        assert_eq!(Counters::get(&counters.rollbacks), 0);
        assert_eq!(
            counters.events(),
            vec!["open", "commit", "close_clean", "release"]
        );
    }

    #[tokio::test]
    async fn test_autorollback_rolls_back_once_and_preserves_error() {
        let factory = TestFactory::default();
        let counters = factory.counters();
        let uow = uow(factory, SessionOptions::default().autocommit(true));

        let err = assert_err!(uow.run(None, fail).await);

        assert!(matches!(err, AppError::Validation(ref msg) if msg == "boom"));
        assert_eq!(err.to_string(), "boom");
        assert_eq!(Counters::get(&counters.commits), 0);
        assert_eq!(Counters::get(&counters.rollbacks), 1);
        assert_eq!(
            counters.events(),
            vec!["open", "rollback", "close_dirty", "release"]
        );
    }

    #[tokio::test]
    async fn test_disabled_autorollback_skips_rollback_but_releases() {
        let factory = TestFactory::default();
        let counters = factory.counters();
        let uow = uow(factory, SessionOptions::default().autorollback(false));

        let err = assert_err!(uow.run(None, fail).await);

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(Counters::get(&counters.rollbacks), 0);
        assert_eq!(counters.events(), vec!["open", "close_dirty", "release"]);
    }

    #[tokio::test]
    async fn test_supplied_session_is_used_untouched() {
        let factory = TestFactory::default();
        let counters = factory.counters();
        let uow = uow(factory, SessionOptions::default().autocommit(true));
        let mut own = uow.factory().detached_session("caller");

        let label = assert_ok!(uow.run(Some(&mut own), succeed).await);
        assert_err!(uow.run(Some(&mut own), fail).await);

        assert_eq!(label, "caller");
        assert_eq!(Counters::get(&counters.opened), 0);
        assert_eq!(Counters::get(&counters.commits), 0);
        assert_eq!(Counters::get(&counters.rollbacks), 0);
        assert_eq!(Counters::get(&counters.closes), 0);
        assert_eq!(Counters::get(&counters.released), 0);

        drop(own);
        assert_eq!(Counters::get(&counters.released), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_is_rolled_back_and_returned() {
        let factory = TestFactory::failing(Failures {
            commit: true,
            ..Failures::default()
        });
        let counters = factory.counters();
        let uow = uow(factory, SessionOptions::default().autocommit(true));

        let err = assert_err!(uow.run(None, succeed).await);

        assert!(matches!(err, AppError::Internal(ref msg) if msg == "commit failed"));
        assert_eq!(
            counters.events(),
            vec!["open", "commit", "rollback", "close_dirty", "release"]
        );
    }

    #[tokio::test]
    async fn test_failed_rollback_is_chained_to_primary_error() {
        let factory = TestFactory::failing(Failures {
            rollback: true,
            ..Failures::default()
        });
        let counters = factory.counters();
        let uow = uow(factory, SessionOptions::default());

        let err = assert_err!(uow.run(None, fail).await);

        assert!(matches!(err.primary(), AppError::Validation(msg) if msg == "boom"));
        match &err {
            AppError::SessionCleanup { cleanup, .. } => {
                assert_eq!(cleanup.to_string(), "Internal server error");
                assert!(matches!(**cleanup, AppError::Internal(ref msg) if msg == "rollback failed"));
            }
            other => panic!("expected a chained cleanup failure, got {:?}", other),
        }
        assert_eq!(Counters::get(&counters.released), 1);
    }

    #[tokio::test]
    async fn test_failed_release_after_success_is_returned() {
        let factory = TestFactory::failing(Failures {
            close: true,
            ..Failures::default()
        });
        let counters = factory.counters();
        let uow = uow(factory, SessionOptions::default());

        let err = assert_err!(uow.run(None, succeed).await);

        assert!(matches!(err, AppError::Internal(ref msg) if msg == "release failed"));
        assert_eq!(Counters::get(&counters.released), 1);
    }

    #[tokio::test]
    async fn test_failed_release_after_failure_keeps_both_errors() {
        let factory = TestFactory::failing(Failures {
            close: true,
            ..Failures::default()
        });
        let uow = uow(factory, SessionOptions::default());

        let err = assert_err!(uow.run(None, fail).await);

        assert!(matches!(err.primary(), AppError::Validation(msg) if msg == "boom"));
        assert!(err.to_string().contains("session cleanup also failed"));
    }

    #[tokio::test]
    async fn test_acquisition_failure_is_propagated_without_running_op() {
        let factory = TestFactory::failing(Failures {
            open: true,
            ..Failures::default()
        });
        let counters = factory.counters();
        let uow = uow(factory, SessionOptions::default());

        let err = assert_err!(uow.run(None, touch).await);

        assert!(matches!(err, AppError::Internal(ref msg) if msg == "pool timed out"));
        assert_eq!(counters.events(), vec!["open"]);
        assert_eq!(Counters::get(&counters.opened), 1);
        assert_eq!(Counters::get(&counters.released), 0);
    }

    #[tokio::test]
    async fn test_cancelled_operation_releases_session() {
        let factory = TestFactory::default();
        let counters = factory.counters();
        let uow = uow(factory, SessionOptions::default());

        let timed_out = tokio::time::timeout(Duration::from_millis(20), uow.run(None, hang)).await;

        assert!(timed_out.is_err());
        assert_eq!(Counters::get(&counters.opened), 1);
        assert_eq!(Counters::get(&counters.closes), 0);
        assert_eq!(Counters::get(&counters.released), 1);
    }

    #[tokio::test]
    async fn test_transaction_mode_begins_and_commits_on_clean_exit() {
        let factory = TestFactory::default();
        let counters = factory.counters();
        let uow = UnitOfWork::transaction(factory);

        assert_ok!(uow.run(None, succeed).await);
        assert_err!(uow.run(None, fail).await);

        assert_eq!(
            counters.events(),
            vec![
                "begin", "close_commit", "release",
                "begin", "rollback", "close_dirty", "release",
            ]
        );
    }

    #[tokio::test]
    async fn test_wrapped_call_opens_a_session_per_call() {
        let factory = TestFactory::default();
        let counters = factory.counters();
        let uow = uow(factory, SessionOptions::default().autocommit(true));

        let greeter = uow.wrap(greet);

        assert_eq!(greeter.call("a".to_string()).await.unwrap(), "a via scoped");
        assert_eq!(greeter.call("b".to_string()).await.unwrap(), "b via scoped");
        assert_eq!(Counters::get(&counters.opened), 2);
        assert_eq!(Counters::get(&counters.commits), 2);
        assert_eq!(Counters::get(&counters.released), 2);

        let mut own = uow.factory().detached_session("caller");
        let via_caller = greeter.call_with(&mut own, "c".to_string()).await.unwrap();
        assert_eq!(via_caller, "c via caller");
        assert_eq!(Counters::get(&counters.opened), 2);
        assert_eq!(Counters::get(&counters.commits), 2);
    }

    #[tokio::test]
    async fn test_with_session_macro_runs_block_in_scope() {
        let factory = TestFactory::default();
        let counters = factory.counters();
        let uow = uow(factory, SessionOptions::default().autocommit(true));

        let result: AppResult<&'static str> = with_session!(uow, |session| {
            session.commit().await.map(|()| session.label)
        });

        assert_eq!(result.unwrap(), "scoped");
        assert_eq!(Counters::get(&counters.commits), 2);
        assert_eq!(Counters::get(&counters.released), 1);
    }

    #[test]
    fn test_invalid_mode_fails_at_construction() {
        let factory = TestFactory::default();
        let counters = factory.counters();
        let config = DatabaseConfig {
            session_mode: "nested".to_string(),
            ..DatabaseConfig::default()
        };

        let result = UnitOfWork::from_config(factory, &config);

        assert!(matches!(result, Err(AppError::Config(ref msg)) if msg.contains("nested")));
        assert!(SessionOptions::with_mode("SESSION").is_err());
        assert_eq!(Counters::get(&counters.opened), 0);
    }

    #[test]
    fn test_options_from_config() {
        let config = DatabaseConfig {
            session_mode: "transaction".to_string(),
            ..DatabaseConfig::default()
        };

        let options = SessionOptions::from_config(&config).unwrap().param_name("db");

        assert_eq!(options.mode, SessionMode::Transaction);
        assert!(options.autorollback);
        assert!(!options.autocommit);
        assert_eq!(options.param_name, "db");
    }
}
