use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use candidate_filter::config::Settings;
use candidate_filter::data::descriptor::SemanticType;
use candidate_filter::data::model::SelectionMask;
use candidate_filter::data::{export, loader};
use candidate_filter::filter::{persistence, Criterion, FilterGroup, Operand};
use candidate_filter::state::Session;

#[derive(Parser)]
#[command(
    name = "candidate-filter",
    version,
    about = "Type-aware filtering of tabular candidate records"
)]
pub struct Cli {
    /// Path to a JSON settings file
    #[arg(long, global = true, env = "CANDIDATE_FILTER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the inferred type and summary of every column
    Describe {
        /// Input file (CSV, TSV, JSON, Parquet, Excel, ODS)
        input: PathBuf,
    },
    /// Filter a file and optionally export the selected rows
    Filter {
        /// Input file (CSV, TSV, JSON, Parquet, Excel, ODS)
        input: PathBuf,

        /// Saved filter document to apply
        #[arg(short, long, conflicts_with = "last")]
        filters: Option<PathBuf>,

        /// Apply the last saved filter set
        #[arg(long)]
        last: bool,

        /// Extra criterion as "COLUMN OPERATOR [OPERAND...]", ANDed with the rest
        #[arg(short = 'w', long = "where", value_name = "CRITERION")]
        criteria: Vec<String>,

        /// Write the selected rows here (format from extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Store the applied filter set as the last used one
        #[arg(long)]
        save_last: bool,

        /// Print the first N selected rows
        #[arg(long, value_name = "N", default_value_t = 10)]
        preview: usize,
    },
    /// List the operators valid for a column type
    Operators {
        /// numeric, text, date, boolean or unknown
        semantic_type: String,
    },
}

pub fn run_command(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    match cli.command {
        Commands::Describe { input } => handle_describe(settings, &input),
        Commands::Filter {
            input,
            filters,
            last,
            criteria,
            output,
            save_last,
            preview,
        } => handle_filter(
            settings,
            &input,
            filters.as_deref(),
            last,
            &criteria,
            output.as_deref(),
            save_last,
            preview,
        ),
        Commands::Operators { semantic_type } => handle_operators(&semantic_type),
    }
}

fn open_session(settings: Settings, input: &Path) -> Result<Session> {
    let raw = loader::load_file(input)
        .with_context(|| format!("loading {}", input.display()))?;
    let mut session = Session::new(settings);
    session.set_dataset(raw);
    Ok(session)
}

fn handle_describe(settings: Settings, input: &Path) -> Result<()> {
    let session = open_session(settings, input)?;
    for descriptor in &session.descriptors {
        println!("{descriptor}");
        if descriptor.is_categorical() && !descriptor.unique_values().is_empty() {
            println!("    values: {}", descriptor.unique_values().join(", "));
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn handle_filter(
    settings: Settings,
    input: &Path,
    filters: Option<&Path>,
    last: bool,
    criteria: &[String],
    output: Option<&Path>,
    save_last: bool,
    preview: usize,
) -> Result<()> {
    let mut session = open_session(settings, input)?;

    let mut group = if let Some(path) = filters {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading filter document {}", path.display()))?;
        persistence::load(&text).with_context(|| format!("loading filters from {}", path.display()))?
    } else if last {
        session.restore_last_filter()?;
        session.filter.clone()
    } else {
        FilterGroup::default()
    };

    if !criteria.is_empty() {
        let mut extra = FilterGroup::default();
        for expr in criteria {
            extra.push(parse_criterion(&session, expr)?);
        }
        group = if group.is_empty() {
            extra
        } else {
            FilterGroup::and([group.into(), extra.into()])
        };
    }

    if group.is_empty() {
        warn!("no criteria given; every row is selected");
    }
    info!("applying filter: {group}");
    session.set_filter(group);

    for diagnostic in &session.diagnostics {
        eprintln!("warning: {diagnostic}");
    }
    if let Some(status) = &session.status_message {
        println!("{status}");
    }

    let selected = session.selected_dataset().unwrap_or_default();
    if preview > 0 && selected.width() > 0 && !selected.is_empty() {
        let head_rows: SelectionMask = (0..selected.len()).map(|i| i < preview).collect();
        let head = selected.take(&head_rows);
        let batch = export::to_record_batch(&head)?;
        println!("{}", arrow::util::pretty::pretty_format_batches(&[batch])?);
    }

    if let Some(path) = output {
        export::write_file(&selected, path)
            .with_context(|| format!("exporting to {}", path.display()))?;
        println!("wrote {} rows to {}", selected.len(), path.display());
    }

    if save_last {
        session.save_last_filter()?;
    }
    Ok(())
}

/// `"age GreaterThan 30"` → criterion typed by the loaded column.
/// Operands with spaces are quoted: `"name Equals 'Ayşe Yılmaz'"`.
fn parse_criterion(session: &Session, expr: &str) -> Result<Criterion> {
    let Some(words) = shlex::split(expr) else {
        bail!("criterion '{expr}' has an unbalanced quote");
    };
    let [column, operator, operands @ ..] = words.as_slice() else {
        bail!("criterion '{expr}' needs at least a column and an operator");
    };
    let operands: Vec<Operand> = operands.iter().map(|o| Operand::from(o.as_str())).collect();
    let parsing = &session.settings.inference;

    if session.descriptor(column).is_some() {
        let semantic_type = session.column_type(column);
        return Ok(Criterion::parse_with(
            column.as_str(),
            semantic_type,
            operator,
            &operands,
            false,
            parsing,
        )?);
    }

    // Kept so evaluation reports the absent column instead of failing here.
    SemanticType::ALL
        .into_iter()
        .find_map(|semantic_type| {
            Criterion::parse_with(column.as_str(), semantic_type, operator, &operands, false, parsing)
                .ok()
        })
        .with_context(|| format!("criterion '{expr}' fits no column type"))
}

fn handle_operators(token: &str) -> Result<()> {
    let Some(semantic_type) = SemanticType::parse(token) else {
        bail!("unknown column type '{token}'");
    };
    for operator in semantic_type.operators() {
        println!("{operator}");
    }
    Ok(())
}
