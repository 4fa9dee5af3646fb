use super::*;

fn default_params() -> JobParams {
    JobParams::default()
}

#[test]
fn test_load_reports_configured_size() {
    // Arrange
    let provider = SyntheticProvider {
        model_size_bytes: 1024,
    };

    // Act
    let handle = provider.load("yolov8n").expect("load should succeed");

    // Assert
    assert_eq!(handle.size_bytes, 1024);
    assert_eq!(handle.key, "yolov8n");
}

#[test]
fn test_preprocess_carries_payload_through() {
    // Arrange
    let provider = SyntheticProvider::default();
    let payload = vec![1, 2, 3, 4];

    // Act
    let prepared = provider
        .preprocess(JobKind::Detect, &payload)
        .expect("preprocess should succeed");

    // Assert
    assert_eq!(prepared.data, payload);
}

#[test]
fn test_postprocess_emits_one_detection_above_threshold() {
    // Arrange
    let provider = SyntheticProvider::default();
    let mut params = default_params();
    params.confidence_threshold = Some(0.9);
    let prediction = RawPrediction { data: vec![] };

    // Act
    let result = provider
        .postprocess(JobKind::Detect, &params, prediction, [640, 480])
        .expect("postprocess should succeed");

    // Assert
    assert_eq!(result.num_detections, 1);
    assert_eq!(result.detections[0].confidence, 0.9);
    assert_eq!(result.image_size, [640, 480]);
}
