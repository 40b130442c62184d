// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `validation.rs`

#[cfg(test)]
mod tests {
    use crate::errors::Error;
    use crate::reconcilers::validation::validate_domains;

    fn domains(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn assert_invalid(list: &[&str]) {
        let result = validate_domains(&domains(list));
        assert!(
            matches!(result, Err(Error::InvalidDomains { .. })),
            "{list:?} should be rejected, got {result:?}"
        );
    }

    #[test]
    fn test_valid_domains_are_normalized() {
        let result =
            validate_domains(&domains(&["B.Example.com", "a.example.com", "b.example.com"]))
                .unwrap();
        assert_eq!(result, domains(&["a.example.com", "b.example.com"]));
    }

    #[test]
    fn test_empty_list_is_rejected() {
        assert_invalid(&[]);
    }

    #[test]
    fn test_too_many_domains_are_rejected() {
        let many: Vec<String> = (0..101).map(|i| format!("d{i}.example.com")).collect();
        assert!(validate_domains(&many).is_err());

        let max: Vec<String> = (0..100).map(|i| format!("d{i}.example.com")).collect();
        assert!(validate_domains(&max).is_ok());
    }

    #[test]
    fn test_wildcards_are_rejected() {
        assert_invalid(&["*.example.com"]);
    }

    #[test]
    fn test_ip_literals_are_rejected() {
        assert_invalid(&["10.0.0.1"]);
        assert_invalid(&["::1"]);
    }

    #[test]
    fn test_malformed_names_are_rejected() {
        assert_invalid(&["localhost"]);
        assert_invalid(&["example.com."]);
        assert_invalid(&["a..example.com"]);
        assert_invalid(&["-a.example.com"]);
        assert_invalid(&["a-.example.com"]);
        assert_invalid(&["a_b.example.com"]);
        assert_invalid(&["a b.example.com"]);
    }

    #[test]
    fn test_length_limits() {
        let long_label = format!("{}.example.com", "a".repeat(64));
        assert_invalid(&[long_label.as_str()]);

        let ok_label = format!("{}.example.com", "a".repeat(63));
        assert!(validate_domains(&domains(&[ok_label.as_str()])).is_ok());

        let long_domain = format!("{}.com", vec!["a".repeat(60); 5].join("."));
        assert!(long_domain.len() > 253);
        assert_invalid(&[long_domain.as_str()]);
    }

    #[test]
    fn test_blank_entry_is_rejected() {
        assert_invalid(&["a.example.com", ""]);
    }
}
