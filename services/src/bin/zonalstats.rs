use clap::Parser;
use zonalstats_services::cli::{ZonalStatistics, run_zonal_statistics};

#[tokio::main(flavor = "current_thread")]
#[allow(clippy::print_stderr)]
async fn main() {
    let params = ZonalStatistics::parse();

    if let Err(err) = run_zonal_statistics(params).await {
        eprintln!("Error: {err}");
        if let Some(text) = err.implicated_text() {
            eprintln!("{text}");
        }
        std::process::exit(1);
    }
}
