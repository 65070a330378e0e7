use crate::util::format_number;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use tabled::Tabled;

/// One row exactly as it appears in the sales CSV. Every field is text so
/// phone and dealer numbers keep their digit sequence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Car_id")]
    pub car_id: Option<String>,
    #[serde(rename = "Date")]
    pub date: Option<String>,
    #[serde(rename = "Customer Name", default)]
    pub customer_name: Option<String>,
    #[serde(rename = "Gender")]
    pub gender: Option<String>,
    #[serde(rename = "Annual Income")]
    pub annual_income: Option<String>,
    #[serde(rename = "Dealer_Name", default)]
    pub dealer_name: Option<String>,
    #[serde(rename = "Company")]
    pub company: Option<String>,
    #[serde(rename = "Model", default)]
    pub model: Option<String>,
    #[serde(rename = "Engine")]
    pub engine: Option<String>,
    #[serde(rename = "Transmission")]
    pub transmission: Option<String>,
    #[serde(rename = "Color")]
    pub color: Option<String>,
    #[serde(rename = "Price ($)")]
    pub price: Option<String>,
    #[serde(rename = "Dealer_No")]
    pub dealer_no: Option<String>,
    #[serde(rename = "Body Style", default)]
    pub body_style: Option<String>,
    #[serde(rename = "Phone")]
    pub phone: Option<String>,
    #[serde(rename = "Dealer_Region")]
    pub dealer_region: Option<String>,
    #[serde(rename = "Latitude", default)]
    pub latitude: Option<String>,
    #[serde(rename = "Longitude", default)]
    pub longitude: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transmission {
    Auto,
    Manual,
    /// Any other literal value, kept verbatim.
    Other(String),
}

impl Transmission {
    pub fn parse(s: &str) -> Self {
        match s {
            "Auto" => Transmission::Auto,
            "Manual" => Transmission::Manual,
            other => Transmission::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Transmission::Auto => "Auto",
            Transmission::Manual => "Manual",
            Transmission::Other(s) => s,
        }
    }
}

impl Serialize for Transmission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SaleRecord {
    pub car_id: String,
    pub date: Option<NaiveDate>,
    pub customer_name: String,
    pub gender: String,
    pub annual_income: Option<f64>,
    pub dealer_name: String,
    pub company: String,
    pub model: String,
    pub engine: String,
    pub transmission: Option<Transmission>,
    pub color: String,
    pub price: Option<f64>,
    pub dealer_no: String,
    pub body_style: String,
    pub phone: String,
    pub dealer_region: String,
    pub coords: Option<Coordinates>,
}

/// Flat view of a cleaned record for the CSV export.
#[derive(Debug, Serialize)]
pub struct CleanedSaleRow<'a> {
    #[serde(rename = "Car_id")]
    pub car_id: &'a str,
    #[serde(rename = "Date")]
    pub date: Option<String>,
    #[serde(rename = "Customer Name")]
    pub customer_name: &'a str,
    #[serde(rename = "Gender")]
    pub gender: &'a str,
    #[serde(rename = "Annual Income")]
    pub annual_income: Option<f64>,
    #[serde(rename = "Dealer_Name")]
    pub dealer_name: &'a str,
    #[serde(rename = "Company")]
    pub company: &'a str,
    #[serde(rename = "Model")]
    pub model: &'a str,
    #[serde(rename = "Engine")]
    pub engine: &'a str,
    #[serde(rename = "Transmission")]
    pub transmission: Option<&'a Transmission>,
    #[serde(rename = "Color")]
    pub color: &'a str,
    #[serde(rename = "Price ($)")]
    pub price: Option<f64>,
    #[serde(rename = "Dealer_No")]
    pub dealer_no: &'a str,
    #[serde(rename = "Body Style")]
    pub body_style: &'a str,
    #[serde(rename = "Phone")]
    pub phone: &'a str,
    #[serde(rename = "Dealer_Region")]
    pub dealer_region: &'a str,
    #[serde(rename = "Latitude")]
    pub lat: Option<f64>,
    #[serde(rename = "Longitude")]
    pub lon: Option<f64>,
}

impl<'a> From<&'a SaleRecord> for CleanedSaleRow<'a> {
    fn from(r: &'a SaleRecord) -> Self {
        Self {
            car_id: &r.car_id,
            date: r.date.map(|d| d.format("%Y-%m-%d").to_string()),
            customer_name: &r.customer_name,
            gender: &r.gender,
            annual_income: r.annual_income,
            dealer_name: &r.dealer_name,
            company: &r.company,
            model: &r.model,
            engine: &r.engine,
            transmission: r.transmission.as_ref(),
            color: &r.color,
            price: r.price,
            dealer_no: &r.dealer_no,
            body_style: &r.body_style,
            phone: &r.phone,
            dealer_region: &r.dealer_region,
            lat: r.coords.map(|c| c.lat),
            lon: r.coords.map(|c| c.lon),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub total_sales: usize,
    pub average_price: f64,
    pub total_revenue: f64,
    pub auto_sales: usize,
    pub manual_sales: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct MonthlySalesRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "Sales")]
    #[tabled(rename = "Sales")]
    pub sales: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct ColorSalesRow {
    #[serde(rename = "Color")]
    #[tabled(rename = "Color")]
    pub color: String,
    #[serde(rename = "Sales")]
    #[tabled(rename = "Sales")]
    pub sales: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct CompanySalesRow {
    #[serde(rename = "Company")]
    #[tabled(rename = "Company")]
    pub company: String,
    #[serde(rename = "TotalSales")]
    #[tabled(rename = "TotalSales", display_with = "display_total")]
    pub total: f64,
}

/// Income buckets × gender counts. `series[g].counts[i]` is the count for
/// `series[g].gender` in `buckets[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeByGender {
    pub buckets: Vec<String>,
    pub series: Vec<GenderSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenderSeries {
    pub gender: String,
    pub counts: Vec<usize>,
}

/// Flattened cell of `IncomeByGender`, used for CSV export and previews.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct IncomeGenderRow {
    #[serde(rename = "IncomeBucket")]
    #[tabled(rename = "IncomeBucket")]
    pub bucket: String,
    #[serde(rename = "Gender")]
    #[tabled(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct GeoPoint {
    #[serde(rename = "Latitude")]
    #[tabled(rename = "Latitude")]
    pub lat: f64,
    #[serde(rename = "Longitude")]
    #[tabled(rename = "Longitude")]
    pub lon: f64,
    #[serde(rename = "Region")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "Price")]
    #[tabled(rename = "Price", display_with = "display_price")]
    pub price: Option<f64>,
}

fn display_total(v: &f64) -> String {
    format_number(*v)
}

fn display_price(p: &Option<f64>) -> String {
    p.map(|v| v.to_string()).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoPointSet {
    pub points: Vec<GeoPoint>,
    pub centroid: Option<Coordinates>,
}

/// Every aggregate the dashboard shows, in one serializable value.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub summary: SummaryMetrics,
    pub sales_by_month: Vec<MonthlySalesRow>,
    pub sales_by_color: Vec<ColorSalesRow>,
    pub income_by_gender: IncomeByGender,
    pub sales_by_company: Vec<CompanySalesRow>,
    pub geo: GeoPointSet,
}
