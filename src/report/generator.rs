//! Markdown and JSON report generation.
//!
//! This module turns the view of an aggregation run into a holdings report,
//! grouped by collection.

use crate::analysis::{group_by_collection, missing_images};
use crate::metadata::resolve_uri;
use crate::models::{
    CollectionConfig, CollectionHoldings, HoldingRecord, HoldingsReport, ReportMetadata,
};
use anyhow::Result;

/// Build a report from run results, grouped in configured collection order.
pub fn build_report(
    metadata: ReportMetadata,
    collections: &[CollectionConfig],
    records: &[HoldingRecord],
) -> HoldingsReport {
    let order: Vec<&str> = collections.iter().map(|c| c.name.as_str()).collect();

    let collections = group_by_collection(records, &order)
        .into_iter()
        .map(|group| CollectionHoldings {
            address: collections
                .iter()
                .find(|c| c.name == group.name)
                .map(|c| c.address.clone())
                .unwrap_or_default(),
            holdings: group.records.into_iter().cloned().collect(),
            name: group.name,
        })
        .collect();

    HoldingsReport {
        metadata,
        collections,
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &HoldingsReport, ipfs_gateway: Option<&str>) -> String {
    let mut output = String::new();

    output.push_str("# Holdings Report\n\n");
    output.push_str(&generate_metadata_section(report));

    for collection in &report.collections {
        output.push_str(&generate_collection_section(collection, ipfs_gateway));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(report: &HoldingsReport) -> String {
    let metadata = &report.metadata;
    let summary = &metadata.summary;
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Owner:** `{}`\n", metadata.owner));
    section.push_str(&format!(
        "- **Network:** {} (chain id {})\n",
        metadata.network, metadata.chain_id
    ));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push_str(&format!(
        "- **Holdings Resolved:** {} of {} discovered\n",
        report.total_holdings(),
        summary.discovered
    ));
    if summary.failed > 0 {
        section.push_str(&format!("- **Failed Lookups:** {}\n", summary.failed));
    }

    let all: Vec<HoldingRecord> = report
        .collections
        .iter()
        .flat_map(|c| c.holdings.iter().cloned())
        .collect();
    let without_image = missing_images(&all).len();
    if without_image > 0 {
        section.push_str(&format!("- **Without Image:** {}\n", without_image));
    }

    match &metadata.error {
        Some(error) => section.push_str(&format!("- **Status:** ⚠️ Incomplete ({})\n", error)),
        None => section.push_str("- **Status:** Complete\n"),
    }
    section.push('\n');

    section
}

/// Generate the section for one collection.
fn generate_collection_section(collection: &CollectionHoldings, ipfs_gateway: Option<&str>) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", collection.name));
    if !collection.address.is_empty() {
        section.push_str(&format!("*Contract: `{}`*\n\n", collection.address));
    }

    if collection.holdings.is_empty() {
        section.push_str("No holdings.\n\n");
        return section;
    }

    section.push_str("| Token | Name | Image |\n");
    section.push_str("|:---|:---|:---|\n");
    for record in &collection.holdings {
        section.push_str(&generate_holding_row(record, ipfs_gateway));
    }
    section.push('\n');

    section
}

/// Generate a single table row.
fn generate_holding_row(record: &HoldingRecord, ipfs_gateway: Option<&str>) -> String {
    let image = match record.image() {
        Some(image) => {
            let url = resolve_uri(image, ipfs_gateway);
            format!("[view]({})", escape_link(&url))
        }
        None => "-".to_string(),
    };

    format!(
        "| #{} | {} | {} |\n",
        record.token_id,
        escape_cell(&record.display_name()),
        image
    )
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Percent-encode characters that end a link target or a table cell.
fn escape_link(url: &str) -> String {
    let mut escaped = String::with_capacity(url.len());
    for c in url.chars() {
        match c {
            '|' => escaped.push_str("%7C"),
            '(' => escaped.push_str("%28"),
            ')' => escaped.push_str("%29"),
            ' ' => escaped.push_str("%20"),
            '<' => escaped.push_str("%3C"),
            '>' => escaped.push_str("%3E"),
            '\n' | '\r' => {}
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by holdscan v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &HoldingsReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunSummary, TokenMetadata};
    use chrono::Utc;

    fn create_test_metadata(error: Option<String>) -> ReportMetadata {
        ReportMetadata {
            owner: "0x00000000000000000000000000000000000000aa".to_string(),
            network: "Jouleverse".to_string(),
            chain_id: 3666,
            generated_at: Utc::now(),
            duration_seconds: 2.5,
            summary: RunSummary {
                generation: 1,
                collections_scanned: 2,
                discovered: 3,
                resolved: 2,
                duplicates: 0,
                failed: 1,
            },
            error,
        }
    }

    fn create_test_record(collection: &str, token_id: &str, name: &str) -> HoldingRecord {
        HoldingRecord {
            collection: collection.to_string(),
            token_id: token_id.to_string(),
            metadata_uri: format!("ipfs://bafy/{token_id}.json"),
            metadata: Some(TokenMetadata {
                name: Some(name.to_string()),
                image: Some(format!("ipfs://bafy/{token_id}.png")),
                ..TokenMetadata::default()
            }),
        }
    }

    fn create_test_report() -> HoldingsReport {
        let collections = vec![
            CollectionConfig::new("CryptoJunks", "0x1b1d15726d64c5027b627138f2bf051cc1EF2680"),
            CollectionConfig::new("BoredApes", "0x6753a24b107Bc92af00a1F9995A6A6fbA6b12B73"),
        ];
        let records = vec![
            create_test_record("CryptoJunks", "11", "Junk | 11"),
            create_test_record("CryptoJunks", "10", "Junk 10"),
        ];
        build_report(create_test_metadata(None), &collections, &records)
    }

    #[test]
    fn test_build_report_groups_in_config_order() {
        let report = create_test_report();

        assert_eq!(report.collections.len(), 2);
        assert_eq!(report.collections[0].name, "CryptoJunks");
        assert_eq!(
            report.collections[0].address,
            "0x1b1d15726d64c5027b627138f2bf051cc1EF2680"
        );
        let ids: Vec<_> = report.collections[0]
            .holdings
            .iter()
            .map(|h| h.token_id.as_str())
            .collect();
        assert_eq!(ids, vec!["11", "10"]);
        assert!(report.collections[1].holdings.is_empty());
        assert_eq!(report.total_holdings(), 2);
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report, Some("https://ipfs.io"));

        assert!(markdown.contains("# Holdings Report"));
        assert!(markdown.contains("## CryptoJunks"));
        assert!(markdown.contains("## BoredApes"));
        assert!(markdown.contains("No holdings."));
        assert!(markdown.contains("| #10 | Junk 10 | [view](https://ipfs.io/ipfs/bafy/10.png) |"));
        assert!(markdown.contains("Junk \\| 11"));
        assert!(markdown.contains("Failed Lookups:** 1"));
        assert!(markdown.contains("Status:** Complete"));
    }

    #[test]
    fn test_image_link_is_escaped() {
        let mut record = create_test_record("CryptoJunks", "12", "Junk 12");
        if let Some(metadata) = record.metadata.as_mut() {
            metadata.image = Some("https://img.example.org/a|b (1).png".to_string());
        }

        let row = generate_holding_row(&record, None);
        assert_eq!(
            row,
            "| #12 | Junk 12 | [view](https://img.example.org/a%7Cb%20%281%29.png) |\n"
        );
    }

    #[test]
    fn test_incomplete_status() {
        let mut report = create_test_report();
        report.metadata.error = Some("failed to read holding count for BoredApes".to_string());

        let markdown = generate_markdown_report(&report, None);

        assert!(markdown.contains("Incomplete"));
        assert!(markdown.contains("ipfs://bafy/10.png"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["chain_id"], 3666);
        assert_eq!(value["collections"][0]["holdings"][0]["token_id"], "11");
        assert!(value["metadata"].get("error").is_none());
    }
}
