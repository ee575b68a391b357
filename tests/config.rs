// ABOUTME: Integration tests for configuration values.
// ABOUTME: Mode selection, .env layering, probe declarations and unit parsing.

use hadron::config::*;
use std::io::Write;
use std::time::Duration;

mod mode {
    use super::*;

    #[test]
    fn defaults_to_execute() {
        temp_env::with_vars_unset([DRY_RUN_VAR, DESTROY_VAR], || {
            assert_eq!(Mode::from_env(), Mode::Execute);
        });
    }

    #[test]
    fn dry_run_flag() {
        temp_env::with_vars([(DRY_RUN_VAR, Some("TRUE")), (DESTROY_VAR, None)], || {
            assert_eq!(Mode::from_env(), Mode::DryRun);
            assert!(!Mode::from_env().is_mutating());
        });
    }

    #[test]
    fn destroy_wins_over_dry_run() {
        temp_env::with_vars(
            [(DRY_RUN_VAR, Some("true")), (DESTROY_VAR, Some("true"))],
            || assert_eq!(Mode::from_env(), Mode::Destroy),
        );
    }

    #[test]
    fn other_values_are_false() {
        temp_env::with_vars([(DRY_RUN_VAR, Some("1")), (DESTROY_VAR, Some("yes"))], || {
            assert_eq!(Mode::from_env(), Mode::Execute);
        });
    }
}

mod environment {
    use super::*;

    fn env_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn process_variables_win_over_file() {
        let file = env_file("HADRON_CFG_LAYERED=file\nHADRON_CFG_FILE_ONLY=file\n");
        temp_env::with_vars(
            [
                ("HADRON_CFG_LAYERED", Some("process")),
                ("HADRON_CFG_FILE_ONLY", None),
            ],
            || {
                let env = Environment::load(file.path()).unwrap();
                assert_eq!(env.get("HADRON_CFG_LAYERED").unwrap(), "process");
                assert_eq!(env.get("HADRON_CFG_FILE_ONLY").unwrap(), "file");
            },
        );
    }

    #[test]
    fn optional_file_may_be_missing() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::load_optional(dir.path().join(".env")).unwrap();
        temp_env::with_var_unset("HADRON_CFG_NOWHERE", || {
            assert!(env.get("HADRON_CFG_NOWHERE").is_err());
        });
    }

    #[test]
    fn malformed_file_is_rejected() {
        let file = env_file("JUST_A_WORD\n");
        assert!(matches!(
            Environment::load(file.path()),
            Err(hadron::error::Error::InvalidEnvFile(_))
        ));
    }
}

mod probes {
    use super::*;

    #[test]
    fn deserializes_retry_budget() {
        let probe: HealthProbe = serde_yaml::from_str(
            "kind: http\npath: /ready\nport: 8080\ntimeout: 90s\ninterval: 2s\nretries: 4\n",
        )
        .unwrap();
        assert_eq!(
            probe.target,
            ProbeTarget::Http {
                path: "/ready".to_string(),
                port: 8080
            }
        );
        assert_eq!(probe.timeout, Duration::from_secs(90));
        assert_eq!(probe.retries, Some(4));
        assert!(probe.validate().is_ok());
    }

    #[test]
    fn defaults_apply_when_omitted() {
        let probe: HealthProbe = serde_yaml::from_str("kind: tcp\nport: 5432\n").unwrap();
        assert_eq!(probe, HealthProbe::tcp(5432));
    }

    #[test]
    fn rejects_unknown_probe_kinds() {
        assert!(serde_yaml::from_str::<HealthProbe>("kind: icmp\nport: 1\n").is_err());
    }
}

mod units {
    use super::*;

    #[test]
    fn restart_policies() {
        assert_eq!(RestartPolicy::default(), RestartPolicy::UnlessStopped);
        assert_eq!(
            "on-failure".parse::<RestartPolicy>().unwrap(),
            RestartPolicy::OnFailure { max_retries: None }
        );
        assert_eq!("always".parse::<RestartPolicy>().unwrap().to_string(), "always");
    }

    #[test]
    fn memory_and_cpus() {
        assert_eq!(parse_memory("512m").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_memory("1G").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_memory("2048").unwrap(), 2048);
        assert!(parse_memory("lots").is_err());
        assert_eq!(parse_cpus("0.5").unwrap(), 0.5);
        assert!(parse_cpus("-1").is_err());
    }

    #[test]
    fn port_mappings() {
        let p = PortMapping::parse("8080:80").unwrap();
        assert_eq!(p.host_port, Some(8080));
        assert_eq!(p.container_port, 80);
        assert_eq!(p.to_string(), "8080:80/tcp");
        assert!(PortMapping::parse("80/sctp").is_err());
        assert!(PortMapping::parse("0").is_err());
    }
}
