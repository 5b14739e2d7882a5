//! End-to-end reconciliation pipeline test: collector lines from several
//! nodes, merged, verified against a mock identity backend, and formatted
//! into the final artifact.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use steward_identity::{
    BackendError, DomainRecord, GatewayConfig, IdentityGateway, MockEndpoint, ProjectRecord,
};
use steward_recon::{Verifier, merge};
use steward_types::{
    AccountStatus, DEFAULT_DELIMITER, FieldSchema, decode_record, format_table,
};

fn domain(id: &str, name: &str, enabled: bool) -> DomainRecord {
    DomainRecord { id: id.to_owned(), name: name.to_owned(), enabled }
}

fn project(id: &str, name: &str, enabled: bool) -> ProjectRecord {
    ProjectRecord { id: id.to_owned(), name: name.to_owned(), enabled }
}

/// One collector line as a storage node would emit it.
fn collector_line(account: &str, domain: &str, deleted: bool) -> String {
    let project = account.strip_prefix("AUTH_").unwrap_or(account);
    format!("{account};{domain};{project};12;4096;0;{deleted};1467019855.71239;0")
}

#[tokio::test]
async fn test_full_pipeline_classifies_and_formats() {
    // Two nodes report overlapping replicas of the same accounts.
    let node_a = [
        collector_line("AUTH_p1", "d1", false),
        collector_line("AUTH_gone", "d1", false),
        collector_line(".expiring_objects", "_unknown", false),
    ]
    .join("\n");
    let node_b = [
        collector_line("AUTH_p1", "d1", false),
        collector_line("AUTH_dead", "d1", true),
        collector_line("AUTH_lost", "_unknown", false),
    ]
    .join("\n");

    let merged = merge(&format!("{node_a}\n{node_b}"), DEFAULT_DELIMITER);
    assert_eq!(merged.summary.unique, 4, "replicas deduped, system account dropped");

    let endpoint = Arc::new(MockEndpoint::new("region-a").with_domain(
        domain("d1", "alpha", true),
        vec![project("p1", "staging", true)],
    ));
    let gateway = Arc::new(
        IdentityGateway::new(vec![endpoint], vec![], GatewayConfig::default()).expect("gateway"),
    );
    let verifier = Verifier::builder().gateway(gateway).default_domain_fallback(true).build();

    let mut records = merged.records;
    let summary = verifier.verify(&mut records).await;

    assert_eq!(summary.total, 4);
    assert_eq!(summary.valid, 1);
    assert_eq!(summary.orphan, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.unknown, 1);
    assert_eq!(
        summary.total,
        summary.valid + summary.invalid + summary.orphan + summary.deleted + summary.unknown
    );

    let by_id = |id: &str| records.iter().find(|r| r.account_id == id).expect("record");
    assert_eq!(by_id("AUTH_p1").status, AccountStatus::Valid);
    assert_eq!(by_id("AUTH_p1").project_name, "staging");
    assert_eq!(by_id("AUTH_gone").status, AccountStatus::Orphan);
    assert_eq!(by_id("AUTH_dead").status, AccountStatus::Deleted);
    assert_eq!(by_id("AUTH_lost").status, AccountStatus::Unknown);

    // The exported artifact round-trips through the full schema.
    let table = format_table(&records, FieldSchema::Full, DEFAULT_DELIMITER, true);
    let mut lines = table.lines();
    let header = lines.next().expect("header row");
    assert!(header.starts_with("backend;domain_name;"));
    for (line, original) in lines.zip(&records) {
        let decoded = decode_record(line, FieldSchema::Full, DEFAULT_DELIMITER).expect("decode");
        assert_eq!(&decoded, original);
    }
}

#[tokio::test]
async fn test_pipeline_partial_backend_outage_is_conservative() {
    let contents = [
        collector_line("AUTH_p1", "d1", false),
        collector_line("AUTH_p2", "d-dark", false),
    ]
    .join("\n");
    let merged = merge(&contents, DEFAULT_DELIMITER);

    // d1 resolves; d-dark's backend is down.
    let endpoint = Arc::new(
        MockEndpoint::new("region-a")
            .with_domain(domain("d1", "alpha", true), vec![project("p1", "staging", true)])
            .fail_domain(
                "d-dark",
                BackendError::Unreachable { message: "connect refused".to_owned() },
            ),
    );
    let gateway = Arc::new(
        IdentityGateway::new(vec![endpoint], vec![], GatewayConfig::default()).expect("gateway"),
    );
    let verifier = Verifier::builder().gateway(gateway).default_domain_fallback(true).build();

    let mut records = merged.records;
    let summary = verifier.verify(&mut records).await;

    let by_id = |id: &str| records.iter().find(|r| r.account_id == id).expect("record");
    assert_eq!(by_id("AUTH_p1").status, AccountStatus::Valid);
    assert_eq!(by_id("AUTH_p2").status, AccountStatus::Unknown, "outage never implies orphan");
    assert_eq!(summary.orphan, 0);
}
