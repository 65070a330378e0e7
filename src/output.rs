// Presentation sink: files on disk plus Markdown previews on stdout.
use crate::config::FormatConfig;
use crate::error::Result;
use crate::types::{CleanedSaleRow, DashboardReport, SaleRecord, SummaryMetrics};
use crate::util::{format_currency, format_int};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

pub const DASHBOARD_FILE: &str = "dashboard.json";
pub const MONTHLY_FILE: &str = "sales_by_month.csv";
pub const COLOR_FILE: &str = "sales_by_color.csv";
pub const INCOME_FILE: &str = "income_by_gender.csv";
pub const COMPANY_FILE: &str = "sales_by_company.csv";
pub const GEO_FILE: &str = "geo_points.csv";
pub const CLEANED_FILE: &str = "cleaned_sales.csv";

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Write the JSON bundle, one CSV per tabular report and the cleaned table
/// into `dir`. Returns the written paths in the order they were created.
pub fn export_dashboard(
    dir: &Path,
    report: &DashboardReport,
    records: &[SaleRecord],
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let json = dir.join(DASHBOARD_FILE);
    write_json(&json, report)?;
    let monthly = dir.join(MONTHLY_FILE);
    write_csv(&monthly, &report.sales_by_month)?;
    let color = dir.join(COLOR_FILE);
    write_csv(&color, &report.sales_by_color)?;
    let income = dir.join(INCOME_FILE);
    write_csv(&income, &report.income_by_gender.rows())?;
    let company = dir.join(COMPANY_FILE);
    write_csv(&company, &report.sales_by_company)?;
    let geo = dir.join(GEO_FILE);
    write_csv(&geo, &report.geo.points)?;
    let cleaned = dir.join(CLEANED_FILE);
    let rows: Vec<CleanedSaleRow> = records.iter().map(CleanedSaleRow::from).collect();
    write_csv(&cleaned, &rows)?;
    log::info!("Exported dashboard to {}", dir.display());
    Ok(vec![json, monthly, color, income, company, geo, cleaned])
}

/// Metric cards as (label, rendered value) pairs.
pub fn metric_lines(
    summary: &SummaryMetrics,
    cfg: &FormatConfig,
) -> Result<Vec<(&'static str, String)>> {
    Ok(vec![
        ("Total Sales", format_int(summary.total_sales)),
        ("Average Price", format_currency(summary.average_price, cfg)?),
        ("Total Revenue", format_currency(summary.total_revenue, cfg)?),
        ("Automatic", format_int(summary.auto_sales)),
        ("Manual", format_int(summary.manual_sales)),
    ])
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::generate_report;
    use crate::types::{Coordinates, SaleRecord, Transmission};
    use chrono::NaiveDate;

    fn record(id: &str, price: f64) -> SaleRecord {
        SaleRecord {
            car_id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2023, 7, 1),
            customer_name: "Ann".to_string(),
            gender: "Female".to_string(),
            annual_income: Some(1_250_000.0),
            dealer_name: "Saab-Belle Dodge".to_string(),
            company: "Dodge".to_string(),
            model: "Ram".to_string(),
            engine: "Overhead Camshaft".to_string(),
            transmission: Some(Transmission::Manual),
            color: "Red".to_string(),
            price: Some(price),
            dealer_no: "60504-7114".to_string(),
            body_style: "Hatchback".to_string(),
            phone: "7203103".to_string(),
            dealer_region: "Scottsdale".to_string(),
            coords: Some(Coordinates { lat: 33.49, lon: -111.92 }),
        }
    }

    #[test]
    fn export_writes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let records = [record("C1", 31_500.0), record("C2", 14_000.0)];
        let report = generate_report(&records);
        let paths = export_dashboard(&dir.path().join("out"), &report, &records).unwrap();
        assert_eq!(paths.len(), 7);
        assert!(paths.iter().all(|p| p.exists()));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths[0]).unwrap()).unwrap();
        assert_eq!(json["summary"]["total_sales"], 2);
        assert_eq!(json["income_by_gender"]["buckets"][0], "900k+");

        let monthly = std::fs::read_to_string(&paths[1]).unwrap();
        assert_eq!(monthly, "Month,Sales\nJulho,2\n");

        let cleaned = std::fs::read_to_string(&paths[6]).unwrap();
        let first = cleaned.lines().nth(1).unwrap();
        assert!(first.starts_with("C1,2023-07-01,Ann,Female,1250000.0,"));
        assert!(first.contains(
            ",Manual,Red,31500.0,60504-7114,Hatchback,7203103,Scottsdale,33.49,-111.92"
        ));
    }

    #[test]
    fn metric_lines_use_format_config() {
        let report = generate_report(&[record("C1", 31_500.0), record("C2", 14_000.0)]);
        let lines = metric_lines(&report.summary, &FormatConfig::default()).unwrap();
        assert_eq!(lines[0], ("Total Sales", "2".to_string()));
        assert_eq!(lines[1], ("Average Price", "$22,750".to_string()));
        assert_eq!(lines[2], ("Total Revenue", "$45,500".to_string()));
        assert_eq!(lines[3], ("Automatic", "0".to_string()));
        assert_eq!(lines[4], ("Manual", "2".to_string()));
    }
}
