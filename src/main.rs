use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
    sync::Arc,
    time::Duration,
};

use clap::Parser;
use kdam::{BarExt, tqdm};
use serde::Serialize;
use tabsearch::{
    DataDir,
    Error,
    IngestReport,
    IngestionJob,
    Ingestor,
    ProgressTracker,
    RecordDb,
    Result,
    Settings,
    catalog,
    export,
    search::{self, SearchQuery},
    settings,
    suggest,
    text_util::column_widths,
};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, ConfigAction, FilesAction};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("TABSEARCH_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let db = Arc::new(data_dir.open_store()?);
    let settings = Settings::load(&db)?;

    match cli.command {
        Command::Ingest(args) => {
            cmd_ingest(db, &settings, &args)?;
        }
        Command::Search(args) => {
            cmd_search(&db, &settings, &args)?;
        }
        Command::Export(args) => {
            cmd_export(&db, &args)?;
        }
        Command::Files { action } => match action {
            FilesAction::List { json } => files_list(&db, json)?,
            FilesAction::Select { id } => files_select(&db, id)?,
            FilesAction::Delete { id } => files_delete(&db, id)?,
        },
        Command::Columns(args) => {
            cmd_columns(&db, &args)?;
        }
        Command::Suggest(args) => {
            cmd_suggest(&db, &args)?;
        }
        Command::Config { action } => match action {
            ConfigAction::Show { json } => config_show(&db, &settings, json)?,
            ConfigAction::Set { key, value } => {
                Settings::set(&db, &key, &value)?;
                println!("Set {key} = {}", value.trim());
            }
            ConfigAction::Clear { key } => {
                if db.remove_setting(&key)? {
                    println!("Cleared {key}");
                } else {
                    println!("{key} was not set");
                }
            }
        },
        Command::Completions(_) => {
            unreachable!("handled before opening the store")
        }
    }

    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer(&mut out, value).map_err(io::Error::from)?;
    writeln!(out)?;
    Ok(())
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Config(format!("not a file path: {}", path.display()))
        })
}

fn cmd_ingest(
    db: Arc<RecordDb>,
    settings: &Settings,
    args: &cli::IngestArgs,
) -> Result<()> {
    let filename = file_name(&args.path)?;
    let file = File::open(&args.path)?;

    let batch_size = args.batch_size.unwrap_or(settings.batch_size);
    let ingestor = Arc::new(
        Ingestor::new(db, Arc::new(ProgressTracker::new()))
            .with_batch_size(batch_size),
    );

    let job = ingestor.spawn(file, &filename)?;
    let report = if args.no_progress {
        job.wait()?
    } else {
        watch(job)?
    };

    println!(
        "Ingested {} row(s) from '{filename}' as file #{}",
        report.rows_processed, report.file_id
    );
    if !report.columns.is_empty() {
        println!("Columns: {}", report.columns.join(", "));
    }
    Ok(())
}

/// Draw a progress bar from the job's snapshots until it finishes.
fn watch(job: IngestionJob) -> Result<IngestReport> {
    let mut pb = tqdm!(desc = "Ingesting", unit = " rows", leave = true);

    loop {
        let finished = job.is_finished();
        let snapshot = job.progress();
        if snapshot.total_rows > 0 {
            pb.total = snapshot.total_rows as usize;
        }
        pb.update_to(snapshot.processed_rows as usize)?;
        if finished {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    eprintln!();

    job.wait()
}

fn cmd_search(
    db: &RecordDb,
    settings: &Settings,
    args: &cli::SearchArgs,
) -> Result<()> {
    let file_id = catalog::target_file(db, args.file)?;
    let query = SearchQuery::new(file_id, args.fields.clone(), &args.query)
        .with_page(args.page, args.page_size.unwrap_or(settings.page_size));

    let page = search::search(db, &query, &settings.weights)?;

    let mut out = io::stdout().lock();
    if args.json {
        search::format_json(&mut out, &page)?;
    } else {
        search::format_human(&mut out, &page, &query.fields())?;
    }
    Ok(())
}

fn cmd_export(db: &RecordDb, args: &cli::ExportArgs) -> Result<()> {
    let file_id = catalog::target_file(db, args.file)?;
    let query = SearchQuery::new(file_id, args.fields.clone(), &args.query);

    let rows = match &args.output {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            export::export_delimited(db, &query, writer)?
        }
        None => export::export_delimited(db, &query, io::stdout().lock())?,
    };

    eprintln!("Exported {rows} row(s)");
    Ok(())
}

fn files_list(db: &RecordDb, json: bool) -> Result<()> {
    let files = catalog::list_files(db)?;

    if json {
        return print_json(&files);
    }
    if files.is_empty() {
        println!("No files ingested.");
        return Ok(());
    }

    let header = ["ID", "FILE", "UPLOADED", "ROWS", "ACTIVE"];
    let rows: Vec<Vec<String>> = files
        .iter()
        .map(|f| {
            vec![
                f.id.to_string(),
                f.filename.clone(),
                f.uploaded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                f.row_count.to_string(),
                if f.is_active { "*" } else { "" }.to_string(),
            ]
        })
        .collect();
    let widths = column_widths(&header, rows.iter().map(Vec::as_slice));

    println!("{}", render_line(&header, &widths));
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        println!("{}", render_line(&cells, &widths));
    }
    Ok(())
}

fn render_line(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn files_select(db: &RecordDb, id: u64) -> Result<()> {
    let selected = catalog::select_file(db, id)?;
    println!("Selected '{}' (file #{id})", selected.filename);
    if !selected.columns.is_empty() {
        println!("Columns: {}", selected.columns.join(", "));
    }
    Ok(())
}

fn files_delete(db: &RecordDb, id: u64) -> Result<()> {
    let removed = catalog::delete_file(db, id)?;
    println!("Deleted '{}' (file #{id})", removed.filename);
    Ok(())
}

fn cmd_columns(db: &RecordDb, args: &cli::ColumnsArgs) -> Result<()> {
    // A fresh process has no ingestion in flight, so this falls through to
    // the stored files.
    let info = catalog::columns(db, &ProgressTracker::new(), args.file)?;

    if args.json {
        return print_json(&info);
    }
    match &info.current_file {
        Some(name) if !info.columns.is_empty() => {
            println!("{name}:");
            for column in &info.columns {
                println!("  {column}");
            }
        }
        _ => println!("No columns available."),
    }
    Ok(())
}

fn cmd_suggest(db: &RecordDb, args: &cli::SuggestArgs) -> Result<()> {
    let suggestions = suggest::suggest(db, args.file, &args.prefix)?;

    if args.json {
        return print_json(&suggestions);
    }
    if suggestions.is_empty() {
        println!("No suggestions.");
    } else {
        for s in &suggestions {
            println!("{}", s.display);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct SettingView {
    key: &'static str,
    value: String,
    stored: bool,
}

fn config_show(db: &RecordDb, current: &Settings, json: bool) -> Result<()> {
    let mut views = Vec::new();
    for &key in settings::KNOWN_KEYS {
        let value = match key {
            settings::BATCH_SIZE => current.batch_size.to_string(),
            settings::PAGE_SIZE => current.page_size.to_string(),
            _ => current.weights.to_string(),
        };
        views.push(SettingView {
            key,
            value,
            stored: db.get_setting(key)?.is_some(),
        });
    }

    if json {
        return print_json(&views);
    }
    for view in &views {
        let origin = if view.stored { "" } else { " (default)" };
        println!("{} = {}{origin}", view.key, view.value);
    }
    Ok(())
}
