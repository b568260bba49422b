//! Configuration for tracing behavior.

/// Configuration options for connection tracing.
///
/// # Example
///
/// ```rust
/// use pg_tracing::TracingConfig;
///
/// let config = TracingConfig::default()
///     .with_statement_logging(true)
///     .with_max_statement_chars(512);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Whether to include the SQL statement in spans as `db.statement`.
    /// Default: `true`
    pub log_statements: bool,

    /// Number of characters of SQL kept in `db.statement`.
    /// Default: 1024
    pub max_statement_chars: usize,

    /// Number of characters of the rendered parameter list kept in
    /// `prepared.statement.input`.
    /// Default: 21
    pub prepared_input_chars: usize,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_statements: true,
            max_statement_chars: 1024,
            prepared_input_chars: 21,
        }
    }
}

impl TracingConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable SQL statement logging in spans.
    ///
    /// **Security Warning**: statements may carry literals with credentials or PII.
    /// Disable this when your queries inline such values instead of binding them.
    pub fn with_statement_logging(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    /// Set how many characters of SQL are kept in `db.statement`.
    pub fn with_max_statement_chars(mut self, chars: usize) -> Self {
        self.max_statement_chars = chars;
        self
    }

    /// Set how many characters of the rendered parameter list are kept
    /// in `prepared.statement.input`.
    pub fn with_prepared_input_chars(mut self, chars: usize) -> Self {
        self.prepared_input_chars = chars;
        self
    }
}
