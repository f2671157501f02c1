use crate::cli::StorageArgs;
use crate::infra::{close_store, open_service};
use admissions::admissions::reporting::{AcceptancePoint, ShareBreakdown};
use admissions::config::AppConfig;
use admissions::error::AppError;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct ExportArgs {
    #[command(flatten)]
    pub(crate) storage: StorageArgs,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ReportArgs {
    /// Override the SQLite database path
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

pub(crate) async fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    args.storage.apply(&mut config.storage);

    let (store, service) = open_service(&config.storage)?;
    let exported = service.export_confirmed().await;
    drop(service);
    close_store(store);

    println!("{}", exported?.display());
    Ok(())
}

pub(crate) async fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    StorageArgs {
        database: args.database,
        exports_dir: None,
    }
    .apply(&mut config.storage);

    let (store, service) = open_service(&config.storage)?;
    let report = async {
        let series = service.acceptance_rate().await?;
        let years = service.year_level_shares().await?;
        let programs = service.degree_program_shares().await?;
        Ok::<_, AppError>((series, years, programs))
    }
    .await;
    drop(service);
    close_store(store);

    let (series, years, programs) = report?;
    print!("{}", render_report(&series, &years, &programs));
    Ok(())
}

fn render_report(
    series: &[AcceptancePoint],
    years: &ShareBreakdown,
    programs: &ShareBreakdown,
) -> String {
    let mut out = String::from("Acceptance rate by month\n");
    if series.is_empty() {
        out.push_str("  no decisions recorded\n");
    }
    for point in series {
        out.push_str(&format!(
            "  {}: {:.1}% ({} confirmed / {} rejected)\n",
            point.date, point.acceptance_rate, point.confirmed, point.rejected
        ));
    }

    for (title, breakdown) in [("Year level", years), ("Degree program", programs)] {
        out.push_str(&format!("{title} share of confirmed students\n"));
        if breakdown.is_empty() {
            out.push_str("  no confirmed students\n");
        }
        for (label, value) in breakdown.labels.iter().zip(&breakdown.values) {
            out.push_str(&format!("  {label}: {value:.1}%\n"));
        }
    }
    out
}
