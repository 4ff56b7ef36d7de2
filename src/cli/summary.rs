//! Table view over the written artifacts

use crate::cli::ui;
use crate::core::config::AppConfig;
use crate::core::report::FundReport;
use anyhow::Result;
use comfy_table::Cell;
use std::fs;
use std::path::Path;
use tracing::debug;

pub fn run(config: &AppConfig) -> Result<()> {
    let output_dir = config.output_dir()?;

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Name"),
        ui::header_cell("1D"),
        ui::header_cell("1W"),
        ui::header_cell("1M"),
        ui::header_cell("3M"),
        ui::header_cell("6M"),
        ui::header_cell("AUM"),
    ]);

    let mut last_updated = None;
    for entry in &config.tickers {
        let ticker = entry.to_config();
        match read_report(&output_dir, &ticker.symbol) {
            Some(report) => {
                last_updated = Some(report.last_updated.clone());
                table.add_row(vec![
                    Cell::new(&report.ticker),
                    Cell::new(&report.name),
                    ui::flow_cell(report.summary.daily),
                    ui::flow_cell(report.summary.weekly),
                    ui::flow_cell(report.summary.monthly),
                    ui::flow_cell(report.summary.three_month),
                    ui::flow_cell(report.summary.six_month),
                    report
                        .metadata
                        .aum
                        .map_or(ui::na_cell(false), |aum| Cell::new(ui::format_compact(aum))),
                ]);
            }
            None => {
                let mut row = vec![Cell::new(&ticker.symbol)];
                row.resize_with(8, || ui::na_cell(true));
                table.add_row(row);
            }
        }
    }

    println!(
        "Fund flows: {}\n",
        ui::style_text("net creation/redemption value", ui::StyleType::Title)
    );
    println!("{table}");
    if let Some(timestamp) = last_updated {
        println!("\nLast refreshed: {timestamp}");
    } else {
        println!("\nNo artifacts found. Run `fundflow refresh` first.");
    }

    Ok(())
}

fn read_report(output_dir: &Path, symbol: &str) -> Option<FundReport> {
    let path = output_dir.join(format!("{symbol}.json"));
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) => {
            debug!(%symbol, error = %e, "No artifact for ticker");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(report) => Some(report),
        Err(e) => {
            debug!(%symbol, error = %e, "Unreadable artifact for ticker");
            None
        }
    }
}
