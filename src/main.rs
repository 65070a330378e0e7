// Entry point and high-level CLI flow.
//
// - Option [1] loads and cleans the sales CSV, geocoding dealer regions when
//   the file has no coordinates, and prints diagnostics.
// - Option [2] builds every dashboard aggregate, exports them and prints
//   previews.
// - After generating reports, the user can choose to go back to the
//   selection menu or exit.
mod config;
mod error;
mod geocode;
mod loader;
mod output;
mod reports;
mod types;
mod util;

use config::DashboardConfig;
use error::Result;
use geocode::{GeocodeCache, GeocodeProvider};
use std::io::{self, Write};
use std::time::Duration;
use types::SaleRecord;

/// Everything one dashboard session owns. The geocode cache lives as long
/// as the session unless a reload clears it.
struct Session {
    config: DashboardConfig,
    cache: GeocodeCache<Box<dyn GeocodeProvider>>,
    data: Option<Vec<SaleRecord>>,
}

impl Session {
    fn new(config: DashboardConfig) -> Result<Self> {
        let provider = geocode::provider_from_config(&config.geocoder)?;
        let delay = Duration::from_millis(config.geocoder.min_delay_ms);
        let mut cache = GeocodeCache::new(provider, delay);
        if let Some(path) = &config.geocoder.cache_path {
            cache.load(path)?;
        }
        Ok(Self {
            config,
            cache,
            data: None,
        })
    }
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Ask the user whether to go back to the report selection menu after
/// generating reports.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        io::stdin().read_line(&mut buf).ok();
        let resp = buf.trim().to_uppercase();
        match resp.as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Handle option [1]: load and clean the CSV file.
///
/// A failed load leaves no dataset behind, so option [2] refuses to run on
/// stale or partial data.
fn handle_load(session: &mut Session) {
    session.data = None;
    // Without a persisted cache, lookups are scoped to a single load pass.
    if session.config.geocoder.cache_path.is_none() && !session.cache.is_empty() {
        log::debug!("Clearing {} cached regions before reload", session.cache.len());
        session.cache.clear();
    }
    let path = session.config.data_path.clone();
    match loader::load_and_clean(&path, &mut session.cache) {
        Ok((data, load_report)) => {
            println!(
                "Processing dataset... ({} rows read, {} kept)",
                util::format_int(load_report.total_rows),
                util::format_int(load_report.kept_rows)
            );
            println!(
                "Note: {} rows skipped due to parse errors, {} rows with unreadable dates.",
                util::format_int(load_report.parse_errors),
                util::format_int(load_report.unparsed_dates)
            );
            if load_report.geocoded_regions + load_report.unresolved_regions > 0 {
                println!(
                    "Info: Geocoded {} regions ({} unresolved, {} rows dropped).",
                    util::format_int(load_report.geocoded_regions),
                    util::format_int(load_report.unresolved_regions),
                    util::format_int(load_report.dropped_rows)
                );
            }
            if let Some(cache_path) = &session.config.geocoder.cache_path {
                if let Err(e) = session.cache.save(cache_path) {
                    log::warn!("Could not persist geocode cache: {e}");
                }
            }
            println!();
            session.data = Some(data);
        }
        Err(e) => {
            eprintln!("Failed to load file: {}\n", e);
        }
    }
}

/// Handle option [2]: generate every aggregate, export and preview them.
fn handle_generate_reports(session: &Session) {
    let Some(data) = session.data.as_deref() else {
        println!("Error: No data loaded. Please load the CSV file first (option 1).\n");
        return;
    };

    println!("Generating reports...");
    let report = reports::generate_report(data);
    match output::export_dashboard(&session.config.output_dir, &report, data) {
        Ok(paths) => {
            for p in paths {
                println!("  wrote {}", p.display());
            }
            println!();
        }
        Err(e) => eprintln!("Write error: {}", e),
    }

    println!("Car Sales Analysis Dashboard\n");
    match output::metric_lines(&report.summary, &session.config.format) {
        Ok(lines) => {
            for (label, value) in lines {
                println!("{label}: {value}");
            }
            println!();
        }
        Err(e) => eprintln!("Format error: {}", e),
    }

    println!("Sales by Month\n");
    output::preview_table_rows(&report.sales_by_month, 12);
    println!("Sales by Color\n");
    output::preview_table_rows(&report.sales_by_color, 5);
    println!("Income by Gender\n");
    output::preview_table_rows(&report.income_by_gender.rows(), 6);
    println!("Sales by Company (ascending)\n");
    output::preview_table_rows(&report.sales_by_company, 5);
    println!("Dealer Locations\n");
    output::preview_table_rows(&report.geo.points, 3);
    if let Some(c) = report.geo.centroid {
        println!("Map centre: {:.4}, {:.4}\n", c.lat, c.lon);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let session = DashboardConfig::load().and_then(Session::new);
    let mut session = match session {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    loop {
        println!("Car Sales Analysis Dashboard");
        println!("[1] Load the file");
        println!("[2] Generate Reports\n");
        match read_choice().as_str() {
            "1" => {
                handle_load(&mut session);
            }
            "2" => {
                println!();
                handle_generate_reports(&session);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => {
                println!("Invalid choice. Please enter 1 or 2.\n");
            }
        }
    }
}
