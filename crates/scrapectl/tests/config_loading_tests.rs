//! Table-driven tests for configuration loading and validation.

mod common;

use std::io::Write;

use scrapectl::config::{load_config, load_config_from_str, LogFormat};

/// Represents a single config loading test case.
struct ConfigTestCase {
    /// Test case name for identification.
    name: &'static str,
    /// The config YAML content to test.
    config_yaml: &'static str,
    /// Whether loading should succeed.
    should_succeed: bool,
    /// Expected error substring (if should_succeed is false).
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        config_yaml: r#"
jobs:
  - id: federal:bills:daily
    scraper: openparliament
"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_yaml: r#"
server:
  listen_addr: "0.0.0.0:9000"
  cors_enabled: false
database:
  path: ":memory:"
logging:
  level: debug
  format: json
history:
  window_days: 7
scheduler:
  enabled: false
  daily_at: "23:45"
queue:
  capacity: 16
jobs:
  - id: federal:bills:daily
    scraper: openparliament
    category: bills
    schedule: "0 6 * * *"
    description: Federal bills
  - id: ca_on:members:bootstrap
    scraper: scrapers-ca
    enabled: false
    daily: false
"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "invalid_no_jobs",
        config_yaml: "jobs: []\n",
        should_succeed: false,
        expected_error: Some("At least one job"),
    },
    ConfigTestCase {
        name: "invalid_duplicate_job",
        config_yaml: r#"
jobs:
  - id: federal:bills:daily
    scraper: openparliament
  - id: federal:bills:daily
    scraper: openparliament
"#,
        should_succeed: false,
        expected_error: Some("Duplicate job id"),
    },
    ConfigTestCase {
        name: "invalid_job_id",
        config_yaml: r#"
jobs:
  - id: "federal::bills"
    scraper: openparliament
"#,
        should_succeed: false,
        expected_error: Some("federal::bills"),
    },
    ConfigTestCase {
        name: "invalid_daily_at",
        config_yaml: r#"
scheduler:
  daily_at: "25:99"
jobs:
  - id: federal:bills:daily
    scraper: openparliament
"#,
        should_succeed: false,
        expected_error: Some("daily_at"),
    },
    ConfigTestCase {
        name: "invalid_window",
        config_yaml: r#"
history:
  window_days: 0
jobs:
  - id: federal:bills:daily
    scraper: openparliament
"#,
        should_succeed: false,
        expected_error: Some("window_days"),
    },
    ConfigTestCase {
        name: "invalid_listen_addr",
        config_yaml: r#"
server:
  listen_addr: "localhost"
jobs:
  - id: federal:bills:daily
    scraper: openparliament
"#,
        should_succeed: false,
        expected_error: Some("listen_addr"),
    },
    ConfigTestCase {
        name: "invalid_yaml",
        config_yaml: "jobs: [\n",
        should_succeed: false,
        expected_error: Some("YAML"),
    },
];

#[test]
fn test_config_loading() {
    for test_case in CONFIG_TESTS {
        let result = load_config_from_str(test_case.config_yaml);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Test '{}': Expected error but got success",
                test_case.name
            );

            if let Some(expected_error) = test_case.expected_error {
                let error_msg = result.err().unwrap().to_string();
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "logging:\n  format: json\njobs:\n  - id: federal:votes:daily\n    scraper: openparliament"
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.jobs[0].id, "federal:votes:daily");
    assert!(config.jobs[0].enabled);
}

#[test]
fn test_load_config_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(dir.path().join("absent.yaml")).unwrap_err();
    assert!(err.to_string().contains("absent.yaml"));
}
