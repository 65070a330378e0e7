use crate::error::{DashboardError, Result};
use crate::geocode::RegionResolver;
use crate::types::{Coordinates, RawRow, SaleRecord, Transmission};
use crate::util::{clean_text, parse_date_safe, parse_f64_safe, strip_special_chars};
use csv::{ByteRecord, ReaderBuilder, StringRecord};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

const REQUIRED_COLUMNS: [&str; 12] = [
    "Car_id",
    "Date",
    "Phone",
    "Dealer_No",
    "Dealer_Region",
    "Engine",
    "Color",
    "Company",
    "Price ($)",
    "Annual Income",
    "Gender",
    "Transmission",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub parse_errors: usize,
    pub unparsed_dates: usize,
    pub geocoded_regions: usize,
    pub unresolved_regions: usize,
    pub dropped_rows: usize,
    pub kept_rows: usize,
}

/// Read, clean and (if needed) geocode the sales table at `path`.
///
/// Failing to open the file or a header without the expected columns is
/// fatal. Everything below the header degrades per row.
pub fn load_and_clean<R>(
    path: &Path,
    resolver: &mut R,
) -> Result<(Vec<SaleRecord>, LoadReport)>
where
    R: RegionResolver + ?Sized,
{
    let file = std::fs::File::open(path)?;
    log::info!("Loading sales table from {}", path.display());
    load_from_reader(file, resolver)
}

pub fn load_from_reader<Rd, R>(
    reader: Rd,
    resolver: &mut R,
) -> Result<(Vec<SaleRecord>, LoadReport)>
where
    Rd: Read,
    R: RegionResolver + ?Sized,
{
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .collect();
    if !missing.is_empty() {
        return Err(DashboardError::Schema(format!(
            "missing columns: {}",
            missing.join(", ")
        )));
    }
    let has_coordinates =
        headers.iter().any(|h| h == "Latitude") && headers.iter().any(|h| h == "Longitude");

    let mut rows = Vec::new();
    let mut parse_errors = 0usize;
    for result in rdr.byte_records() {
        match result
            .map_err(DashboardError::from)
            .and_then(|raw| decode_row(&raw, &headers))
        {
            Ok(r) => rows.push(r),
            Err(e) => {
                log::debug!("Skipping unreadable row: {e}");
                parse_errors += 1;
            }
        }
    }

    let (records, mut report) = clean_rows(rows, has_coordinates, resolver);
    report.total_rows += parse_errors;
    report.parse_errors = parse_errors;
    Ok((records, report))
}

/// Fields are decoded lossily, so invalid UTF-8 replaces the offending
/// bytes instead of costing the whole row.
fn decode_row(raw: &ByteRecord, headers: &StringRecord) -> Result<RawRow> {
    let fields: Vec<String> = raw
        .iter()
        .map(|f| String::from_utf8_lossy(f).into_owned())
        .collect();
    let record = StringRecord::from(fields);
    let row: RawRow = record.deserialize(Some(headers))?;
    Ok(row)
}

/// Clean already-parsed rows. When `has_coordinates` is false every
/// distinct dealer region is resolved once and rows that stay without
/// coordinates are dropped.
pub fn clean_rows<R>(
    rows: Vec<RawRow>,
    has_coordinates: bool,
    resolver: &mut R,
) -> (Vec<SaleRecord>, LoadReport)
where
    R: RegionResolver + ?Sized,
{
    let mut report = LoadReport {
        total_rows: rows.len(),
        ..LoadReport::default()
    };
    let mut records: Vec<SaleRecord> = rows.into_iter().map(clean_row).collect();
    report.unparsed_dates = records.iter().filter(|r| r.date.is_none()).count();
    if report.unparsed_dates > 0 {
        log::warn!("{} rows have an unparseable date", report.unparsed_dates);
    }

    if !has_coordinates {
        records = enrich_coordinates(records, resolver, &mut report);
    }
    report.kept_rows = records.len();
    (records, report)
}

fn clean_row(row: RawRow) -> SaleRecord {
    let transmission = clean_text(row.transmission.as_deref());
    let coords = match (
        parse_f64_safe(row.latitude.as_deref()),
        parse_f64_safe(row.longitude.as_deref()),
    ) {
        (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
        _ => None,
    };
    SaleRecord {
        car_id: clean_text(row.car_id.as_deref()),
        date: parse_date_safe(row.date.as_deref()),
        customer_name: clean_text(row.customer_name.as_deref()),
        gender: clean_text(row.gender.as_deref()),
        annual_income: parse_f64_safe(row.annual_income.as_deref()),
        dealer_name: clean_text(row.dealer_name.as_deref()),
        company: clean_text(row.company.as_deref()),
        model: clean_text(row.model.as_deref()),
        engine: strip_special_chars(row.engine.as_deref().unwrap_or_default()),
        transmission: (!transmission.is_empty()).then(|| Transmission::parse(&transmission)),
        color: clean_text(row.color.as_deref()),
        price: parse_f64_safe(row.price.as_deref()),
        dealer_no: clean_text(row.dealer_no.as_deref()),
        body_style: clean_text(row.body_style.as_deref()),
        phone: clean_text(row.phone.as_deref()),
        dealer_region: clean_text(row.dealer_region.as_deref()),
        coords,
    }
}

fn enrich_coordinates<R>(
    records: Vec<SaleRecord>,
    resolver: &mut R,
    report: &mut LoadReport,
) -> Vec<SaleRecord>
where
    R: RegionResolver + ?Sized,
{
    // First-appearance order keeps provider traffic deterministic.
    let regions: Vec<String> = {
        let mut seen = HashSet::new();
        records
            .iter()
            .filter(|r| seen.insert(r.dealer_region.as_str()))
            .map(|r| r.dealer_region.clone())
            .collect()
    };

    let mut resolved: HashMap<String, Option<Coordinates>> = HashMap::new();
    for region in regions {
        let coords = if region.is_empty() {
            None
        } else {
            resolver.resolve(&region)
        };
        if coords.is_some() {
            report.geocoded_regions += 1;
        } else {
            report.unresolved_regions += 1;
        }
        resolved.insert(region, coords);
    }
    log::info!(
        "Geocoded {} regions, {} unresolved",
        report.geocoded_regions,
        report.unresolved_regions
    );

    let before = records.len();
    let kept: Vec<SaleRecord> = records
        .into_iter()
        .filter_map(|mut r| {
            r.coords = resolved.get(&r.dealer_region).copied().flatten();
            r.coords.is_some().then_some(r)
        })
        .collect();
    report.dropped_rows = before - kept.len();
    if report.dropped_rows > 0 {
        log::warn!("Dropped {} rows without coordinates", report.dropped_rows);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::tests::FakeProvider;
    use crate::geocode::GeocodeCache;
    use crate::reports::generate_report;
    use chrono::NaiveDate;
    use std::io::Write;
    use std::time::Duration;

    const HEADER: &str = "Car_id,Date,Customer Name,Gender,Annual Income,Dealer_Name,\
        Company,Model,Engine,Transmission,Color,Price ($),Dealer_No ,Body Style,\
        Phone,Dealer_Region";

    fn csv(rows: &[&str]) -> String {
        let mut s = String::from(HEADER);
        for r in rows {
            s.push('\n');
            s.push_str(r);
        }
        s
    }

    fn cache() -> GeocodeCache<FakeProvider> {
        GeocodeCache::new(
            FakeProvider::with(&[("Austin", 30.27, -97.74), ("Janesville", 42.68, -89.01)]),
            Duration::ZERO,
        )
    }

    #[test]
    fn cleans_text_dates_and_numbers() {
        let input = csv(&[
            "C_CND_000001,1/2/2022, Geraldine ,Male,13500, Buddy Storbeck's ,Ford ,Expedition,\
             DoubleÂ Overhead Camshaft,Auto,Black,26000,06457-3834,SUV,08264678,Austin",
        ]);
        let mut cache = cache();
        let (records, report) = load_from_reader(input.as_bytes(), &mut cache).unwrap();
        assert_eq!(report.kept_rows, 1);
        let r = &records[0];
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2022, 1, 2));
        assert_eq!(r.customer_name, "Geraldine");
        assert_eq!(r.dealer_name, "Buddy Storbeck's");
        assert_eq!(r.company, "Ford");
        assert_eq!(r.engine, "DoubleÂ Overhead Camshaft");
        assert_eq!(r.phone, "08264678");
        assert_eq!(r.dealer_no, "06457-3834");
        assert_eq!(r.price, Some(26000.0));
        assert_eq!(r.annual_income, Some(13500.0));
        assert_eq!(r.transmission, Some(Transmission::Auto));
        assert_eq!(r.coords, Some(Coordinates { lat: 30.27, lon: -97.74 }));
    }

    #[test]
    fn bad_date_and_price_are_kept_as_missing() {
        let input = csv(&[
            "C1,yesterday,A,Male,abc,D,Ford,M,V6,Manual,Red,n/a,1,SUV,1,Austin",
        ]);
        let mut cache = cache();
        let (records, report) = load_from_reader(input.as_bytes(), &mut cache).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, None);
        assert_eq!(records[0].price, None);
        assert_eq!(records[0].annual_income, None);
        assert_eq!(report.unparsed_dates, 1);
    }

    #[test]
    fn unresolved_regions_are_dropped_and_looked_up_once() {
        let input = csv(&[
            "C1,1/2/2022,A,Male,1,D,Ford,M,V6,Auto,Red,1,1,SUV,1,Austin",
            "C2,1/2/2022,A,Male,1,D,Ford,M,V6,Auto,Red,1,1,SUV,1,Atlantis",
            "C3,1/2/2022,A,Male,1,D,Ford,M,V6,Auto,Red,1,1,SUV,1,Atlantis",
            "C4,1/2/2022,A,Male,1,D,Ford,M,V6,Auto,Red,1,1,SUV,1,boom",
            "C5,1/2/2022,A,Male,1,D,Ford,M,V6,Auto,Red,1,1,SUV,1,Janesville",
            "C6,1/2/2022,A,Male,1,D,Ford,M,V6,Auto,Red,1,1,SUV,1,Austin",
        ]);
        let mut cache = cache();
        let (records, report) = load_from_reader(input.as_bytes(), &mut cache).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.car_id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "C5", "C6"]);
        assert!(records.iter().all(|r| r.coords.is_some()));
        assert_eq!(report.geocoded_regions, 2);
        assert_eq!(report.unresolved_regions, 2);
        assert_eq!(report.dropped_rows, 3);
        assert_eq!(cache.provider().calls.get(), 4);
    }

    #[test]
    fn existing_coordinates_skip_geocoding() {
        let input = format!(
            "{HEADER},Latitude,Longitude\n\
             C1,1/2/2022,A,Male,1,D,Ford,M,V6,Auto,Red,1,1,SUV,1,Atlantis,10.5,20.25\n\
             C2,1/2/2022,A,Male,1,D,Ford,M,V6,Auto,Red,1,1,SUV,1,Atlantis,,"
        );
        let mut cache = cache();
        let (records, report) = load_from_reader(input.as_bytes(), &mut cache).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].coords, Some(Coordinates { lat: 10.5, lon: 20.25 }));
        assert_eq!(records[1].coords, None);
        assert_eq!(report.dropped_rows, 0);
        assert_eq!(cache.provider().calls.get(), 0);
    }

    #[test]
    fn invalid_utf8_field_keeps_the_row() {
        let mut input = HEADER.as_bytes().to_vec();
        input.extend_from_slice(b"\nC1,1/2/2022,Jos");
        input.push(0xE9);
        input.extend_from_slice(b",Male,1,D,Ford,M,V6,Auto,Red,100,1,SUV,1,Austin");
        let mut cache = cache();
        let (records, report) = load_from_reader(input.as_slice(), &mut cache).unwrap();
        assert_eq!(report.parse_errors, 0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].customer_name, "Jos\u{FFFD}");
        assert_eq!(records[0].price, Some(100.0));
    }

    #[test]
    fn csv_text_flows_through_to_the_reports() {
        let input = csv(&[
            "C1,1/15/2019,A,Male,1,D,Ford,M,V6,Auto,Red,100,1,SUV,1,Austin",
            "C2,2021-01-03,A,Male,1,D,Ford,M,V6, Manual ,Red,200,1,SUV,1,Austin",
            "C3,31/31/2021,A,Male,1,D,Ford,M,V6,auto,Red,300,1,SUV,1,Janesville",
            "C4,garbage,A,Male,1,D,Ford,M,V6, CVT ,Red,400,1,SUV,1,Janesville",
        ]);
        let mut cache = cache();
        let (records, report) = load_from_reader(input.as_bytes(), &mut cache).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(report.unparsed_dates, 2);
        assert_eq!(records[3].transmission, Some(Transmission::Other("CVT".to_string())));

        let dashboard = generate_report(&records);
        let months: Vec<(&str, usize)> = dashboard
            .sales_by_month
            .iter()
            .map(|r| (r.month.as_str(), r.sales))
            .collect();
        assert_eq!(months, vec![("Janeiro", 2)]);
        assert_eq!(dashboard.summary.auto_sales, 1);
        assert_eq!(dashboard.summary.manual_sales, 1);
        assert_eq!(dashboard.summary.total_sales, 4);
        assert_eq!(dashboard.summary.total_revenue, 1000.0);
        assert_eq!(dashboard.geo.points.len(), 4);
    }

    #[test]
    fn missing_columns_are_fatal() {
        let mut cache = cache();
        let input = "Car_id,Date\nC1,1/2/2022";
        let err = load_from_reader(input.as_bytes(), &mut cache).unwrap_err();
        assert!(matches!(err, DashboardError::Schema(_)));
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache();
        let err = load_and_clean(&dir.path().join("nope.csv"), &mut cache).unwrap_err();
        assert!(matches!(err, DashboardError::Io(_)));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            csv(&["C1,2021-03-04,A,Female,1,D,Audi,M,V6,Manual,Red,100,1,SUV,1,Janesville"])
        )
        .unwrap();
        let mut cache = cache();
        let (records, report) = load_and_clean(file.path(), &mut cache).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(report.total_rows, 1);
        assert_eq!(report.parse_errors, 0);
    }
}
