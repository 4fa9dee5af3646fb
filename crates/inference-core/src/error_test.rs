// Error module tests
//
// Arrange-Act-Assert pattern with fixtures and edge case coverage.

use super::*;
use std::io;

fn create_test_io_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, "file not found")
}

#[cfg(test)]
mod core_error_conversion_tests {
    use super::*;

    #[test]
    fn test_io_error_converts_via_from() {
        // Arrange
        let io_err = create_test_io_error();

        // Act
        let core_err: CoreError = io_err.into();

        // Assert
        assert!(matches!(core_err, CoreError::Io(_)));
    }

    #[test]
    fn test_serde_error_converts_via_from() {
        // Arrange
        let bad_json = "{not valid json";

        // Act
        let parse_result: std::result::Result<serde_json::Value, _> =
            serde_json::from_str(bad_json);
        let core_err: CoreError = parse_result.unwrap_err().into();

        // Assert
        assert!(matches!(core_err, CoreError::Serialization(_)));
    }
}

#[cfg(test)]
mod core_error_display_tests {
    use super::*;

    #[test]
    fn test_queue_full_message() {
        assert_eq!(CoreError::QueueFull.to_string(), "queue is full");
    }

    #[test]
    fn test_not_running_message() {
        assert_eq!(
            CoreError::NotRunning.to_string(),
            "scheduler is not running"
        );
    }

    #[test]
    fn test_not_found_includes_identifier() {
        // Arrange
        let err = CoreError::NotFound("job-42".to_string());

        // Act
        let message = err.to_string();

        // Assert
        assert!(message.contains("job-42"));
    }

    #[test]
    fn test_model_load_failed_includes_key_and_message() {
        // Arrange
        let err = CoreError::ModelLoadFailed {
            key: "yolov8n".to_string(),
            message: "file not found".to_string(),
        };

        // Act
        let message = err.to_string();

        // Assert
        assert!(message.contains("yolov8n"));
        assert!(message.contains("file not found"));
    }

    #[test]
    fn test_max_reconnects_exceeded_message() {
        assert_eq!(
            CoreError::MaxReconnectsExceeded.to_string(),
            "max reconnect attempts exceeded"
        );
    }
}
