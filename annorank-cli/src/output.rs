//! Output formatting: terminal table, JSON, and CSV export of the wide rank table.

use annorank_core::{ItemId, RankTable, WideRankTable};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io;

/// Column header for one annotator's ranks.
pub fn rank_column(annotator: &str) -> String {
    format!("Ranks_{annotator}")
}

#[derive(Serialize)]
struct JsonItem<'a> {
    item_id: ItemId,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_name: Option<&'a str>,
    /// Annotator → rank, only for annotators that compared the item.
    ranks: BTreeMap<&'a str, usize>,
    comparisons: usize,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    method: &'a str,
    annotators: &'a [String],
    items: Vec<JsonItem<'a>>,
    /// Full per-annotator tables, including fitted scores.
    tables: &'a [RankTable],
}

fn cell(rank: Option<usize>) -> String {
    rank.map(|r| r.to_string()).unwrap_or_default()
}

/// Print the wide table to stdout, one row per item.
pub fn print_table(wide: &WideRankTable, names: &HashMap<ItemId, String>) {
    print!("{}", render_table(wide, names));
}

fn render_table(wide: &WideRankTable, names: &HashMap<ItemId, String>) -> String {
    let headers: Vec<String> = wide.annotators.iter().map(|a| rank_column(a)).collect();
    let show_names = !names.is_empty();

    let id_width = wide
        .rows
        .iter()
        .map(|r| r.item.to_string().len())
        .max()
        .unwrap_or(0)
        .max(4); // at least "Item"
    let name_width = wide
        .rows
        .iter()
        .filter_map(|r| names.get(&r.item).map(|n| n.len()))
        .max()
        .unwrap_or(0)
        .max(5); // at least "Image"

    let mut header = format!("{:>id_width$}", "Item");
    if show_names {
        header.push_str(&format!(" | {:<name_width$}", "Image"));
    }
    for h in &headers {
        header.push_str(&format!(" | {h}"));
    }
    header.push_str(" | Comparisons");

    let mut out = String::new();
    out.push_str(&format!("{header}\n{}\n", "-".repeat(header.len())));

    for row in &wide.rows {
        let mut line = format!("{:>id_width$}", row.item);
        if show_names {
            let name = names.get(&row.item).map(String::as_str).unwrap_or("");
            line.push_str(&format!(" | {:<name_width$}", name));
        }
        for (h, rank) in headers.iter().zip(&row.ranks) {
            line.push_str(&format!(" | {:>width$}", cell(*rank), width = h.len()));
        }
        line.push_str(&format!(" | {:>11}", row.comparisons));
        out.push_str(&format!("{line}\n"));
    }

    // Every record mentions two items.
    let total: usize = wide.rows.iter().map(|r| r.comparisons).sum::<usize>() / 2;
    out.push_str(&format!(
        "\n{} items ranked across {} annotators ({} comparisons, rank 1 = weakest)\n",
        wide.rows.len(),
        wide.annotators.len(),
        total,
    ));
    out
}

/// Print results as JSON.
pub fn print_json(method: &str, wide: &WideRankTable, tables: &[RankTable], names: &HashMap<ItemId, String>) {
    let items = wide
        .rows
        .iter()
        .map(|row| JsonItem {
            item_id: row.item,
            image_name: names.get(&row.item).map(String::as_str),
            ranks: wide
                .annotators
                .iter()
                .zip(&row.ranks)
                .filter_map(|(a, r)| r.map(|r| (a.as_str(), r)))
                .collect(),
            comparisons: row.comparisons,
        })
        .collect();

    let output = JsonOutput { method, annotators: &wide.annotators, items, tables };

    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{json}"),
        Err(e) => crate::bail(format!("Failed to serialize results: {e}")),
    }
}

/// Write the wide table as CSV: `item_id[,image_name],Ranks_<annotator>...`.
///
/// Missing ranks are empty cells. The name column only appears when an image
/// key was loaded.
pub fn write_csv<W: io::Write>(
    writer: W,
    wide: &WideRankTable,
    names: &HashMap<ItemId, String>,
) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    let show_names = !names.is_empty();

    let mut header = vec!["item_id".to_string()];
    if show_names {
        header.push("image_name".to_string());
    }
    header.extend(wide.annotators.iter().map(|a| rank_column(a)));
    out.write_record(&header)?;

    for row in &wide.rows {
        let mut record = vec![row.item.to_string()];
        if show_names {
            record.push(names.get(&row.item).cloned().unwrap_or_default());
        }
        record.extend(row.ranks.iter().map(|r| cell(*r)));
        out.write_record(&record)?;
    }

    out.flush()?;
    Ok(())
}
