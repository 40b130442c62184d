// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use clap::Parser;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["managed-certs-controller", "--project", "my-project"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).expect("valid arguments")
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.workers, 2);
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.metrics_port, 8080);
        assert!(!config.disable_leader_election);
        assert!(config.validate().is_ok());

        let backoff = config.backoff();
        assert_eq!(backoff.initial_interval, Duration::from_millis(100));
        assert_eq!(backoff.max_interval, Duration::from_secs(300));
        assert_eq!(
            config.reconciler_config().poll_interval,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_project_is_required() {
        let result = Config::try_parse_from(["managed-certs-controller"]);
        if std::env::var("PROVIDER_PROJECT").is_err() {
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--namespace",
            "team-a",
            "--workers",
            "8",
            "--poll-interval-secs",
            "5",
            "--lease-name",
            "custom-lease",
            "--lease-namespace",
            "ops",
            "--pod-name",
            "controller-0",
            "--metrics-bind-address",
            "127.0.0.1",
            "--metrics-port",
            "9090",
        ]);

        assert_eq!(config.namespace.as_deref(), Some("team-a"));
        assert_eq!(config.workers, 8);
        assert_eq!(config.reconciler_config().poll_interval, Duration::from_secs(5));

        let lease = config.lease_config();
        assert_eq!(lease.lease_name, "custom-lease");
        assert_eq!(lease.namespace, "ops");
        assert_eq!(lease.identity, "controller-0");

        assert_eq!(config.metrics_addr().unwrap().to_string(), "127.0.0.1:9090");
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = parse(&["--workers", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_grace_not_shorter_than_duration() {
        let config = parse(&["--lease-duration-secs", "5", "--lease-grace-secs", "5"]);
        assert!(config.validate().is_err());

        let config = parse(&[
            "--lease-duration-secs",
            "5",
            "--lease-grace-secs",
            "5",
            "--disable-leader-election",
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_bind_address() {
        let config = parse(&["--metrics-bind-address", "not-an-ip"]);
        assert!(config.validate().is_err());
    }
}
