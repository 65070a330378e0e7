use crate::error::{DashboardError, Result};
use crate::types::{
    ColorSalesRow, CompanySalesRow, Coordinates, DashboardReport, GenderSeries, GeoPoint,
    GeoPointSet, IncomeByGender, IncomeGenderRow, MonthlySalesRow, SaleRecord, SummaryMetrics,
};
use crate::util::average;
use chrono::Datelike;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub const MONTH_NAMES: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

pub const INCOME_BUCKET_WIDTH: f64 = 100_000.0;
/// Number of closed buckets below the open-ended `900k+` one.
pub const INCOME_BUCKETS: usize = 9;

pub fn generate_report(data: &[SaleRecord]) -> DashboardReport {
    DashboardReport {
        summary: summary_metrics(data),
        sales_by_month: sales_by_month(data),
        sales_by_color: sales_by_color(data),
        income_by_gender: income_by_gender(data),
        sales_by_company: sales_by_company(data),
        geo: geo_points(data),
    }
}

pub fn summary_metrics(data: &[SaleRecord]) -> SummaryMetrics {
    let ids: HashSet<&str> = data.iter().map(|r| r.car_id.as_str()).collect();
    let prices: Vec<f64> = data.iter().filter_map(|r| r.price).collect();

    let mut transmissions: HashMap<&str, usize> = HashMap::new();
    for t in data.iter().filter_map(|r| r.transmission.as_ref()) {
        *transmissions.entry(t.as_str()).or_default() += 1;
    }
    let count_or_zero = |category: &str| {
        category_count(&transmissions, category).unwrap_or_else(|e| {
            log::warn!("{e}; counting 0");
            0
        })
    };

    SummaryMetrics {
        total_sales: ids.len(),
        // Halves go to the even neighbour.
        average_price: average(&prices).round_ties_even(),
        total_revenue: prices.iter().sum(),
        auto_sales: count_or_zero("Auto"),
        manual_sales: count_or_zero("Manual"),
    }
}

/// Exact-value lookup in a frequency table.
fn category_count(counts: &HashMap<&str, usize>, category: &str) -> Result<usize> {
    counts
        .get(category)
        .copied()
        .ok_or_else(|| DashboardError::MissingCategory(category.to_string()))
}

/// Sales per calendar month, all years merged. Only observed months are
/// emitted, January first.
pub fn sales_by_month(data: &[SaleRecord]) -> Vec<MonthlySalesRow> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for d in data.iter().filter_map(|r| r.date) {
        *counts.entry(d.month0()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(m, sales)| MonthlySalesRow {
            month: MONTH_NAMES[m as usize].to_string(),
            sales,
        })
        .collect()
}

/// Rows per color, most frequent first. Ties keep first appearance.
pub fn sales_by_color(data: &[SaleRecord]) -> Vec<ColorSalesRow> {
    let mut rows: Vec<ColorSalesRow> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for r in data {
        match index.get(r.color.as_str()) {
            Some(&i) => rows[i].sales += 1,
            None => {
                index.insert(r.color.as_str(), rows.len());
                rows.push(ColorSalesRow {
                    color: r.color.clone(),
                    sales: 1,
                });
            }
        }
    }
    rows.sort_by(|a, b| b.sales.cmp(&a.sales));
    rows
}

pub fn income_bucket(income: f64) -> Option<usize> {
    if !income.is_finite() || income < 0.0 {
        return None;
    }
    Some(((income / INCOME_BUCKET_WIDTH) as usize).min(INCOME_BUCKETS))
}

pub fn income_bucket_label(idx: usize) -> String {
    if idx >= INCOME_BUCKETS {
        return format!("{}k+", INCOME_BUCKETS * 100);
    }
    format!("{}k-{}k", idx * 100, (idx + 1) * 100)
}

/// Income bucket × gender counts.
///
/// Buckets are ordered by their total count across genders, smallest
/// first, not by income. Buckets with no rows are omitted.
pub fn income_by_gender(data: &[SaleRecord]) -> IncomeByGender {
    let mut cells: HashMap<(usize, &str), usize> = HashMap::new();
    let mut totals: BTreeMap<usize, usize> = BTreeMap::new();
    let mut genders: BTreeSet<&str> = BTreeSet::new();
    for r in data {
        if r.gender.is_empty() {
            continue;
        }
        let Some(bucket) = r.annual_income.and_then(income_bucket) else {
            continue;
        };
        *cells.entry((bucket, r.gender.as_str())).or_default() += 1;
        *totals.entry(bucket).or_default() += 1;
        genders.insert(r.gender.as_str());
    }

    // Stable sort over income order, so equal totals stay income-ordered.
    let mut order: Vec<(usize, usize)> = totals.into_iter().collect();
    order.sort_by_key(|&(_, total)| total);

    let series = genders
        .into_iter()
        .map(|g| GenderSeries {
            gender: g.to_string(),
            counts: order
                .iter()
                .map(|(b, _)| cells.get(&(*b, g)).copied().unwrap_or(0))
                .collect(),
        })
        .collect();
    IncomeByGender {
        buckets: order.iter().map(|(b, _)| income_bucket_label(*b)).collect(),
        series,
    }
}

impl IncomeByGender {
    pub fn rows(&self) -> Vec<IncomeGenderRow> {
        let mut rows = Vec::new();
        for (i, bucket) in self.buckets.iter().enumerate() {
            for s in &self.series {
                rows.push(IncomeGenderRow {
                    bucket: bucket.clone(),
                    gender: s.gender.clone(),
                    count: s.counts[i],
                });
            }
        }
        rows
    }
}

/// Price totals per manufacturer, smallest first.
pub fn sales_by_company(data: &[SaleRecord]) -> Vec<CompanySalesRow> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for r in data {
        if r.company.is_empty() {
            continue;
        }
        if let Some(p) = r.price {
            *totals.entry(r.company.as_str()).or_default() += p;
        }
    }
    let mut rows: Vec<CompanySalesRow> = totals
        .into_iter()
        .map(|(company, total)| CompanySalesRow {
            company: company.to_string(),
            total,
        })
        .collect();
    rows.sort_by(|a, b| a.total.partial_cmp(&b.total).unwrap_or(Ordering::Equal));
    rows
}

pub fn geo_points(data: &[SaleRecord]) -> GeoPointSet {
    let points: Vec<GeoPoint> = data
        .iter()
        .filter_map(|r| {
            r.coords.map(|c| GeoPoint {
                lat: c.lat,
                lon: c.lon,
                region: r.dealer_region.clone(),
                price: r.price,
            })
        })
        .collect();
    let centroid = (!points.is_empty()).then(|| Coordinates {
        lat: average(&points.iter().map(|p| p.lat).collect::<Vec<_>>()),
        lon: average(&points.iter().map(|p| p.lon).collect::<Vec<_>>()),
    });
    GeoPointSet { points, centroid }
}
