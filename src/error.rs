use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("db connection with name {0} not found")]
    NotFound(String),
    #[error("teardown finished with {} errors: {}", .0.len(), join_errors(.0))]
    Teardown(Vec<Error>),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Folds a list of failures into a single error, `None` when the list is
    /// empty. A single failure is returned as-is instead of being wrapped.
    pub fn aggregate(mut errors: Vec<Error>) -> Option<Error> {
        return match errors.len() {
            0 => None,
            1 => Some(errors.remove(0)),
            _ => Some(Error::Teardown(errors)),
        };
    }
}

fn join_errors(errors: &[Error]) -> String {
    return errors
        .iter()
        .map(|err| err.to_string())
        .collect::<Vec<_>>()
        .join("; ");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_empty_is_none() {
        assert!(Error::aggregate(Vec::new()).is_none());
    }

    #[test]
    fn aggregate_single_is_unwrapped() {
        let err = Error::aggregate(vec![Error::NotFound("custom".to_string())]).unwrap();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn aggregate_reports_every_error() {
        let err = Error::aggregate(vec![
            Error::NotFound("one".to_string()),
            Error::NotFound("two".to_string()),
        ])
        .unwrap();
        let msg = err.to_string();
        assert!(msg.contains("2 errors"));
        assert!(msg.contains("one"));
        assert!(msg.contains("two"));
    }
}
