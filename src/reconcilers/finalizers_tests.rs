// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `finalizers.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{CertificateRequest, CertificateRequestSpec};
    use crate::reconcilers::finalizers::{
        finalizer_patch, has_finalizer, is_deleting, with_finalizer, without_finalizer,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
    use k8s_openapi::jiff::Timestamp;
    use serde_json::json;

    const TEST_FINALIZER: &str = "test.firestoned.io/finalizer";

    fn create_test_request(finalizers: Option<Vec<String>>) -> CertificateRequest {
        CertificateRequest {
            metadata: ObjectMeta {
                name: Some("test-resource".to_string()),
                namespace: Some("test-namespace".to_string()),
                finalizers,
                generation: Some(1),
                ..Default::default()
            },
            spec: CertificateRequestSpec {
                domains: vec!["a.example.com".to_string()],
            },
            status: None,
        }
    }

    #[test]
    fn test_has_finalizer() {
        assert!(!has_finalizer(&create_test_request(None), TEST_FINALIZER));
        assert!(!has_finalizer(
            &create_test_request(Some(vec!["other".to_string()])),
            TEST_FINALIZER
        ));
        assert!(has_finalizer(
            &create_test_request(Some(vec![TEST_FINALIZER.to_string()])),
            TEST_FINALIZER
        ));
    }

    #[test]
    fn test_with_finalizer_appends_once() {
        let obj = create_test_request(Some(vec!["other".to_string()]));
        assert_eq!(
            with_finalizer(&obj, TEST_FINALIZER),
            Some(vec!["other".to_string(), TEST_FINALIZER.to_string()])
        );

        let obj = create_test_request(Some(vec![TEST_FINALIZER.to_string()]));
        assert_eq!(with_finalizer(&obj, TEST_FINALIZER), None);
    }

    #[test]
    fn test_without_finalizer_keeps_others() {
        let obj = create_test_request(Some(vec![
            "other".to_string(),
            TEST_FINALIZER.to_string(),
        ]));
        assert_eq!(
            without_finalizer(&obj, TEST_FINALIZER),
            Some(vec!["other".to_string()])
        );
        assert_eq!(without_finalizer(&create_test_request(None), TEST_FINALIZER), None);
    }

    #[test]
    fn test_is_deleting() {
        let mut obj = create_test_request(None);
        assert!(!is_deleting(&obj));
        obj.metadata.deletion_timestamp = Some(Time(Timestamp::now()));
        assert!(is_deleting(&obj));
    }

    #[test]
    fn test_finalizer_patch_carries_resource_version() {
        let finalizers = vec![TEST_FINALIZER.to_string()];
        assert_eq!(
            finalizer_patch(&finalizers, Some("42")),
            json!({ "metadata": { "finalizers": [TEST_FINALIZER], "resourceVersion": "42" } })
        );
        assert_eq!(
            finalizer_patch(&[], None),
            json!({ "metadata": { "finalizers": [] } })
        );
    }
}
