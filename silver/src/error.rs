//! Error types and result definitions for silver pipelines.
//!
//! [`SilverError`] carries a classification, a static description, optional dynamic detail and
//! the callsite that raised it. Errors from many workers can be aggregated into one value, which
//! is how [`crate::pipeline::Pipeline::wait`] reports failures.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use silver_config::shared::ValidationError;

use crate::validation::ExpressionError;

/// Result type used throughout the crate.
pub type SilverResult<T> = Result<T, SilverError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Error raised by any stage of a silver pipeline.
///
/// Cloning is cheap, sources and backtraces are shared.
#[derive(Debug, Clone)]
pub struct SilverError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Errors collected from several workers.
    Many {
        errors: Vec<SilverError>,
        location: &'static Location<'static>,
    },
}

/// Classification of a [`SilverError`].
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration
    ConfigError,
    InvalidPipeline,

    // Data
    ValidationFailed,

    // Sources and state
    SourceIoError,
    StateStoreError,
    IoError,
    DeserializationError,

    // Workers
    TableWorkerPanic,
    MergeTaskPanic,

    Unknown,
}

impl SilverError {
    /// Returns the [`ErrorKind`] of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error, flattening aggregates.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors.iter().flat_map(|err| err.kinds()).collect(),
        }
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { .. } => "Multiple errors occurred",
        }
    }

    /// Returns the dynamic detail, for aggregates the first one available.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the location where the error was created.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches the originating error.
    ///
    /// Has no effect on aggregated errors, they forward their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }

        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SilverError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }

    #[track_caller]
    fn from_source<E>(kind: ErrorKind, description: &'static str, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = err.to_string();
        SilverError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl PartialEq for SilverError {
    fn eq(&self, other: &SilverError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for SilverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line()
                )?;

                if let Some(detail) = &payload.detail {
                    write!(f, "\n  Detail: {detail}")?;
                }

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() && !backtrace.starts_with("disabled") {
                    write!(f, "\n  Backtrace:")?;
                    for line in backtrace.lines() {
                        write!(f, "\n    {line}")?;
                    }
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}",
                    errors.len(),
                    if errors.len() == 1 { "" } else { "s" },
                    location.file(),
                    location.line()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    write!(f, "\n  {}. {}", index + 1, lines.next().unwrap_or_default())?;
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for SilverError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for SilverError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SilverError {
        SilverError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for SilverError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SilverError {
        SilverError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors, a single error is returned unwrapped.
impl<E> From<Vec<E>> for SilverError
where
    E: Into<SilverError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> SilverError {
        let location = Location::caller();
        let mut errors: Vec<SilverError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        SilverError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<serde_json::Error> for SilverError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SilverError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        SilverError::from_source(kind, description, err)
    }
}

impl From<ExpressionError> for SilverError {
    #[track_caller]
    fn from(err: ExpressionError) -> SilverError {
        SilverError::from_source(ErrorKind::ConfigError, "Invalid validation rule", err)
    }
}

impl From<ValidationError> for SilverError {
    #[track_caller]
    fn from(err: ValidationError) -> SilverError {
        SilverError::from_source(ErrorKind::ConfigError, "Invalid pipeline configuration", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::silver_error;

    #[test]
    fn aggregate_of_one_error_is_unwrapped() {
        let err: SilverError = vec![silver_error!(ErrorKind::SourceIoError, "Read failed")].into();

        assert_eq!(err.kind(), ErrorKind::SourceIoError);
        assert_eq!(err.kinds(), vec![ErrorKind::SourceIoError]);
    }

    #[test]
    fn aggregate_flattens_kinds() {
        let inner: SilverError = vec![
            silver_error!(ErrorKind::ValidationFailed, "Row failed"),
            silver_error!(ErrorKind::StateStoreError, "Commit failed"),
        ]
        .into();
        let err: SilverError =
            vec![inner, silver_error!(ErrorKind::SourceIoError, "Source failed")].into();

        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(
            err.kinds(),
            vec![
                ErrorKind::ValidationFailed,
                ErrorKind::StateStoreError,
                ErrorKind::SourceIoError
            ]
        );
    }

    #[test]
    fn detail_and_source_are_exposed() {
        let io = std::io::Error::other("disk gone");
        let err = silver_error!(ErrorKind::SourceIoError, "Read failed", "bookings.jsonl", source: io);

        assert_eq!(err.detail(), Some("bookings.jsonl"));
        assert!(error::Error::source(&err).is_some());
        assert!(err.to_string().contains("Read failed"));
    }
}
