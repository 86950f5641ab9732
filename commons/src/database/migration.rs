//! Schema migrations through `diesel_migrations`.
//!
//! Migrations run on a synchronous [`PgConnection`]; call them from
//! `tokio::task::spawn_blocking` when inside the runtime.

use diesel::pg::Pg;
use diesel::{Connection, PgConnection, RunQueryDsl, sql_query};
use diesel::migration::MigrationSource;
use diesel_migrations::MigrationHarness;
use tracing::{info, warn};

/// Errors raised while migrating.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    /// The source holds no migrations.
    #[error("no migrations to run")]
    Empty,

    /// The source could not be read.
    #[error("failed to read migrations: {message}")]
    Source { message: String },

    /// No connection could be opened.
    #[error("failed to connect for migrations: {message}")]
    Connection { message: String },

    /// Reverting existing migrations failed.
    #[error("revert failed: {message}")]
    Revert { message: String },

    /// Applying pending migrations failed.
    #[error("migration failed: {message}")]
    Apply { message: String },
}

/// Migration behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Revert every applied migration first. Destroys data.
    pub revert_first: bool,
    /// Run the extra index statements after migrating.
    pub create_indexes: bool,
    /// Log progress at `INFO`.
    pub verbose: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            revert_first: false,
            create_indexes: true,
            verbose: true,
        }
    }
}

/// Applies a migration source plus optional index statements.
///
/// # Examples
///
/// ```no_run
/// use diesel::{Connection, PgConnection};
/// use diesel_migrations::FileBasedMigrations;
/// use service_commons::database::{MigrationOptions, Migrator};
///
/// # fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let mut conn = PgConnection::establish("postgres://localhost/app")?;
/// let source = FileBasedMigrations::from_path("migrations")?;
/// Migrator::new(source, MigrationOptions::default())
///     .with_indexes(["CREATE INDEX IF NOT EXISTS idx_created_at ON items(created_at)"])
///     .migrate(&mut conn)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Migrator<S> {
    source: S,
    options: MigrationOptions,
    indexes: Vec<String>,
}

impl<S> Migrator<S>
where
    S: MigrationSource<Pg> + Clone,
{
    /// Migrator over `source`.
    pub fn new(source: S, options: MigrationOptions) -> Self {
        Self {
            source,
            options,
            indexes: Vec::new(),
        }
    }

    /// Statements run after migrating when `create_indexes` is set.
    #[must_use]
    pub fn with_indexes<I, T>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.indexes.extend(statements.into_iter().map(Into::into));
        self
    }

    /// Active options.
    #[must_use]
    pub const fn options(&self) -> MigrationOptions {
        self.options
    }

    /// Number of migrations in the source.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Source`] when the source cannot be read.
    pub fn migration_count(&self) -> Result<usize, MigrationError> {
        self.source
            .migrations()
            .map(|migrations| migrations.len())
            .map_err(|err| MigrationError::Source {
                message: err.to_string(),
            })
    }

    /// Apply pending migrations, returning the versions applied.
    ///
    /// Index statements that fail are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Empty`] for an empty source, otherwise the
    /// read, revert or apply failure.
    pub fn migrate(&self, conn: &mut PgConnection) -> Result<Vec<String>, MigrationError> {
        let total = self.non_empty_count()?;
        self.progress(&format!("starting migration of {total} migrations"));

        if self.options.revert_first {
            warn!("reverting all applied migrations before migrating");
            conn.revert_all_migrations(self.source.clone())
                .map_err(|err| MigrationError::Revert {
                    message: err.to_string(),
                })?;
        }

        let applied: Vec<String> = conn
            .run_pending_migrations(self.source.clone())
            .map_err(|err| MigrationError::Apply {
                message: err.to_string(),
            })?
            .iter()
            .map(ToString::to_string)
            .collect();
        self.progress(&format!(
            "migration completed; {} newly applied",
            applied.len()
        ));

        if self.options.create_indexes {
            self.create_indexes(conn);
        }
        Ok(applied)
    }

    /// Open a connection to `database_url` and [`Migrator::migrate`].
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Connection`] when the connection fails,
    /// otherwise as [`Migrator::migrate`].
    pub fn migrate_url(&self, database_url: &str) -> Result<Vec<String>, MigrationError> {
        self.non_empty_count()?;
        let mut conn =
            PgConnection::establish(database_url).map_err(|err| MigrationError::Connection {
                message: err.to_string(),
            })?;
        self.migrate(&mut conn)
    }

    fn non_empty_count(&self) -> Result<usize, MigrationError> {
        match self.migration_count()? {
            0 => Err(MigrationError::Empty),
            total => Ok(total),
        }
    }

    fn create_indexes(&self, conn: &mut PgConnection) {
        if self.indexes.is_empty() {
            return;
        }
        self.progress("creating additional indexes");
        for statement in &self.indexes {
            if let Err(err) = sql_query(statement.as_str()).execute(conn) {
                warn!(statement = %statement, error = %err, "failed to create index");
            }
        }
    }

    fn progress(&self, message: &str) {
        if self.options.verbose {
            info!("{message}");
        }
    }
}

/// Apply `source` with default options.
///
/// # Errors
///
/// See [`Migrator::migrate`].
pub fn quick_migrate<S>(conn: &mut PgConnection, source: S) -> Result<Vec<String>, MigrationError>
where
    S: MigrationSource<Pg> + Clone,
{
    Migrator::new(source, MigrationOptions::default()).migrate(conn)
}

/// Revert everything in `source`, then apply it again. Destroys data.
///
/// # Errors
///
/// See [`Migrator::migrate`].
pub fn unsafe_migrate<S>(conn: &mut PgConnection, source: S) -> Result<Vec<String>, MigrationError>
where
    S: MigrationSource<Pg> + Clone,
{
    warn!("unsafe migration requested; all tables managed by migrations will be dropped");
    let options = MigrationOptions {
        revert_first: true,
        ..MigrationOptions::default()
    };
    Migrator::new(source, options).migrate(conn)
}
