use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sky_cover_dashboard::dashboard::DashboardView;
use sky_cover_dashboard::db::{self, PgRecordSource};
use sky_cover_dashboard::export::{self, ExportOptions, DEFAULT_FOOTER};
use sky_cover_dashboard::models::Query;
use sky_cover_dashboard::paginate::{Orientation, PageGeometry, PageSize};
use sky_cover_dashboard::report;
use sky_cover_dashboard::slot::{self, QuerySlot};
use sky_cover_dashboard::source::{JsonFileSource, RecordSource};
use sky_cover_dashboard::surface::{ChartSurface, RasterSurface, Surface};

#[derive(Parser)]
#[command(name = "sky-cover-dashboard")]
#[command(about = "Sky cover aggregation and report export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the summary table for a selection
    Summary {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long)]
        input: Option<PathBuf>,
        /// Print the full view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export a selection as a table or a paginated document
    Export {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        document: DocumentArgs,
    },
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("scope")
        .args(["day", "from", "year"])
        .required(true)
        .multiple(false)
))]
struct ScopeArgs {
    /// Single day, YYYY-MM-DD
    #[arg(long)]
    day: Option<String>,
    /// First day of a range, YYYY-MM-DD
    #[arg(long, requires = "to")]
    from: Option<String>,
    /// Last day of a range (inclusive), YYYY-MM-DD
    #[arg(long, requires = "from")]
    to: Option<String>,
    /// Group the range by week instead of by day
    #[arg(long, requires = "from")]
    week: bool,
    #[arg(long, requires = "month")]
    year: Option<i32>,
    #[arg(long, requires = "year")]
    month: Option<u32>,
}

impl ScopeArgs {
    fn query(&self) -> anyhow::Result<Query> {
        if let Some(day) = &self.day {
            return Ok(Query::SingleDay { day: day.clone() });
        }
        if let (Some(year), Some(month)) = (self.year, self.month) {
            return Ok(Query::CalendarMonth { year, month });
        }
        match (&self.from, &self.to) {
            (Some(from), Some(to)) if self.week => Ok(Query::Week {
                from: from.clone(),
                to: to.clone(),
            }),
            (Some(from), Some(to)) => Ok(Query::CustomRange {
                from: from.clone(),
                to: to.clone(),
            }),
            _ => anyhow::bail!("select --day, --from/--to, or --year/--month"),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Xlsx,
    Markdown,
    Pdf,
}

#[derive(Args)]
struct DocumentArgs {
    /// Target resolution of the captured surface
    #[arg(long)]
    dpi: Option<f64>,
    #[arg(long, default_value_t = 3.0)]
    max_scale: f64,
    #[arg(long, value_enum, default_value_t = PageSize::A4)]
    page_size: PageSize,
    #[arg(long, value_enum, default_value_t = Orientation::Portrait)]
    orientation: Orientation,
    #[arg(long, default_value_t = 12.0)]
    margin_mm: f64,
    #[arg(long)]
    header: Option<String>,
    #[arg(long)]
    footer: Option<String>,
    #[arg(long)]
    no_page_numbers: bool,
    /// Pre-rendered PNG to paginate instead of the built-in chart
    #[arg(long)]
    surface: Option<PathBuf>,
}

fn database_url() -> anyhow::Result<String> {
    std::env::var("DATABASE_URL").context("DATABASE_URL must be set when --input is not given")
}

fn record_source(input: Option<PathBuf>) -> anyhow::Result<Box<dyn RecordSource>> {
    match input {
        Some(path) => Ok(Box::new(JsonFileSource::new(path))),
        None => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect_lazy(&database_url()?)
                .context("invalid DATABASE_URL")?;
            Ok(Box::new(PgRecordSource::new(pool)))
        }
    }
}

async fn load_view(scope: &ScopeArgs, input: Option<PathBuf>) -> anyhow::Result<DashboardView> {
    let query = scope.query()?;
    let source = record_source(input)?;
    let slot = QuerySlot::new();
    slot::refresh(&slot, source.as_ref(), &query)
        .await?
        .context("request was superseded")
}

fn print_summary(view: &DashboardView) {
    println!(
        "{} records, average {:.2} oktas, confidence {}%",
        view.kpis.total_records, view.kpis.average_metric, view.kpis.confidence_percent
    );
    if view.table.is_empty() {
        println!("No records for this selection ({:?}).", view.status);
        return;
    }
    for row in &view.table {
        println!(
            "- {}: {:.2} oktas ({}%), confidence {}%, {} ({}) across {} records",
            row.label,
            row.average,
            row.percentage,
            row.confidence_percent,
            row.dominant_category,
            row.dominant_description,
            row.record_count
        );
    }
    for share in &view.distribution {
        println!("  {} {:>5.1}% {}", share.code, share.percent, share.description);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sky_cover_dashboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url()?)
                .await
                .context("failed to connect to Postgres")?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import { csv } => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url()?)
                .await
                .context("failed to connect to Postgres")?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} records from {}.", csv.display());
        }
        Commands::Summary { scope, input, json } => {
            let view = load_view(&scope, input).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_summary(&view);
            }
        }
        Commands::Export {
            scope,
            input,
            format,
            out,
            document,
        } => {
            let view = load_view(&scope, input).await?;
            let today = chrono::Local::now().date_naive();

            match format {
                ExportFormat::Csv => {
                    let out = out.unwrap_or_else(|| {
                        report::default_file_name(view.mode, "csv", today).into()
                    });
                    std::fs::write(&out, report::to_csv(view.mode, &view.table)?)?;
                    println!("CSV written to {}.", out.display());
                }
                ExportFormat::Xlsx => {
                    let out = out.unwrap_or_else(|| {
                        report::default_file_name(view.mode, "xlsx", today).into()
                    });
                    std::fs::write(&out, report::to_workbook(view.mode, &view.table)?)?;
                    println!("Workbook written to {}.", out.display());
                }
                ExportFormat::Markdown => {
                    let out = out.unwrap_or_else(|| {
                        report::default_file_name(view.mode, "md", today).into()
                    });
                    std::fs::write(&out, report::build_markdown(&view))?;
                    println!("Report written to {}.", out.display());
                }
                ExportFormat::Pdf => {
                    let out = out.unwrap_or_else(|| export::default_document_name(view.mode).into());
                    let options = ExportOptions {
                        geometry: PageGeometry::new(document.page_size, document.orientation)
                            .with_margin(document.margin_mm),
                        target_dpi: document.dpi,
                        max_scale: document.max_scale,
                        header: Some(
                            document
                                .header
                                .unwrap_or_else(|| export::default_header(&view.range)),
                        ),
                        footer: Some(document.footer.unwrap_or_else(|| DEFAULT_FOOTER.to_string())),
                        number_pages: !document.no_page_numbers,
                    };

                    let surface: Box<dyn Surface> = match &document.surface {
                        Some(path) => Box::new(
                            RasterSurface::open(path)
                                .with_context(|| format!("failed to load {}", path.display()))?,
                        ),
                        None => Box::new(ChartSurface::new(&view.series, &view.trend)),
                    };
                    let job = export::export_to_file(Some(surface.as_ref()), &options, &out).await?;
                    println!("{} pages written to {}.", job.page_count, out.display());
                }
            }
        }
    }

    Ok(())
}
