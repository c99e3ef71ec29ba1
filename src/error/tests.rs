//! Tests for error types.

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("debounce must be positive");
        assert_eq!(
            err.to_string(),
            "configuration error: debounce must be positive"
        );
    }

    #[test]
    fn test_storage_error_not_found() {
        let err = StorageError::not_found("track", "17");
        assert_eq!(err.to_string(), "not found: track with id '17'");
    }

    #[test]
    fn test_storage_error_conversion() {
        let storage_err = StorageError::Database("connection failed".to_string());
        let err: Error = storage_err.into();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_rusqlite_error_conversion() {
        let err: StorageError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StorageError::Database(_)));
    }

    #[test]
    fn test_extractor_error_conversion() {
        let ext_err = ExtractorError::Unreadable {
            path: "/music/a.flac".to_string(),
            reason: "permission denied".to_string(),
        };
        let err: Error = ext_err.into();
        assert!(matches!(err, Error::Extractor(_)));
        assert!(err.to_string().contains("/music/a.flac"));
    }

    #[test]
    fn test_watcher_error_conversion() {
        let watch_err = WatcherError::WatchFailed {
            path: "/tmp/test".to_string(),
            reason: "permission denied".to_string(),
        };
        let err: Error = watch_err.into();
        assert!(matches!(err, Error::Watcher(_)));
    }

    #[test]
    fn test_watch_limit_display() {
        let err = WatcherError::WatchLimit {
            path: "/music/deep".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "watch limit reached while registering '/music/deep'"
        );
    }

    #[test]
    fn test_scan_error_conversion() {
        let scan_err = ScanError::LocationsFrozen("/music".to_string());
        let err: Error = scan_err.into();
        assert!(matches!(err, Error::Scan(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_internal() {
        let err = Error::internal("test internal error");
        assert_eq!(err.to_string(), "internal error: test internal error");
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn inner() -> Result<i32> {
            Err(Error::config("inner error"))
        }

        fn outer() -> Result<i32> {
            let _ = inner()?;
            Ok(0)
        }

        let result = outer();
        assert_eq!(
            result.unwrap_err().to_string(),
            "configuration error: inner error"
        );
    }
}
