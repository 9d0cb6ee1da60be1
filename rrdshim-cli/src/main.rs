//! CLI for round-robin databases, built on rrdshim.
//!
//! Provides commands for creating, updating, inspecting, and querying
//! rrdtool databases through the system librrd.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use rrdshim::{
    Client, ClientConfig, ConsolidationFn, Creator, DsType, Exporter, InfoValue, Updater,
};
use tracing_subscriber::EnvFilter;

/// rrdshim: inspect and query round-robin databases.
#[derive(Parser)]
#[command(name = "rrdshim", version, about)]
struct Cli {
    /// JSON client config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// rrdcached address; overrides the config and `RRDCACHED_ADDRESS`.
    #[arg(long, global = true)]
    daemon: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Display the header of a database.
    Info {
        /// Path to the database.
        file: PathBuf,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Fetch consolidated rows from a database.
    Fetch {
        /// Path to the database.
        file: PathBuf,

        /// Consolidation function.
        #[arg(long, default_value = "AVERAGE")]
        cf: ConsolidationFn,

        /// Time range ending now (e.g., "1h", "30m", "7d").
        #[arg(long, default_value = "1h")]
        range: String,

        /// Requested resolution in seconds; librrd picks the closest archive.
        #[arg(long, default_value = "1")]
        step: u64,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Create a database.
    Create {
        /// Path to the database.
        file: PathBuf,

        /// Base interval in seconds.
        #[arg(long, default_value = "300")]
        step: u64,

        /// Time of the first allowed update (defaults to 10 seconds ago).
        #[arg(long)]
        start: Option<i64>,

        /// Data source, `name:TYPE:heartbeat:min:max` or `name:COMPUTE:rpn`.
        #[arg(long = "ds", required = true)]
        data_sources: Vec<String>,

        /// Archive, `CF:xff:steps:rows`.
        #[arg(long = "rra", required = true)]
        archives: Vec<String>,

        /// Replace an existing file.
        #[arg(long)]
        overwrite: bool,
    },

    /// Feed rows into a database.
    Update {
        /// Path to the database.
        file: PathBuf,

        /// Rows such as `N:1.5:2` or `1700000000:U:3`.
        #[arg(required = true)]
        rows: Vec<String>,

        /// Colon-separated data source names the rows refer to.
        #[arg(long)]
        template: Option<String>,
    },

    /// Export computed series.
    Xport {
        /// Source series, `vname=file:ds:CF`.
        #[arg(long = "def", required = true)]
        defs: Vec<String>,

        /// Computed series, `vname=rpn`.
        #[arg(long = "cdef")]
        cdefs: Vec<String>,

        /// Exported column, `vname[:label]`. Defaults to every DEF.
        #[arg(long = "xport")]
        columns: Vec<String>,

        /// Time range ending now (e.g., "1h", "30m", "7d").
        #[arg(long, default_value = "1h")]
        range: String,

        /// Requested resolution in seconds.
        #[arg(long, default_value = "60")]
        step: u64,

        /// Maximum number of rows.
        #[arg(long)]
        max_rows: Option<u32>,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },
}

/// Output format for tabular results.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON object.
    Json,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref(), cli.daemon.as_deref()).and_then(|config| {
        let client = Client::native_with_config(config);
        match cli.command {
            Commands::Info { file, format } => cmd_info(&client, &file, &format),
            Commands::Fetch {
                file,
                cf,
                range,
                step,
                format,
            } => cmd_fetch(&client, &file, cf, &range, step, &format),
            Commands::Create {
                file,
                step,
                start,
                data_sources,
                archives,
                overwrite,
            } => cmd_create(&client, file, step, start, &data_sources, &archives, overwrite),
            Commands::Update {
                file,
                rows,
                template,
            } => cmd_update(&client, file, rows, template.as_deref()),
            Commands::Xport {
                defs,
                cdefs,
                columns,
                range,
                step,
                max_rows,
                format,
            } => cmd_xport(
                &client, &defs, &cdefs, &columns, &range, step, max_rows, &format,
            ),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Loads the config file if given, then applies the environment and the
/// `--daemon` flag.
fn load_config(path: Option<&Path>, daemon: Option<&str>) -> CliResult<ClientConfig> {
    let config = match path {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    let config = config.with_env().with_daemon_override(daemon);
    config.validate()?;
    tracing::debug!("client config: {config:?}");
    Ok(config)
}

/// Implements `rrdshim info <file>`.
fn cmd_info(client: &Client<rrdshim::Native>, file: &Path, format: &OutputFormat) -> CliResult<()> {
    let info = client.info(file)?;

    match format {
        OutputFormat::Csv => {
            println!("key,value");
            for (key, value) in info.iter() {
                let rendered = match value {
                    InfoValue::Value(v) => v.to_string(),
                    InfoValue::Count(c) => c.to_string(),
                    InfoValue::Int(i) => i.to_string(),
                    InfoValue::Str(s) => s.clone(),
                    InfoValue::Blob(b) => format!("<{} bytes>", b.len()),
                };
                println!("{key},{rendered}");
            }
        }
        OutputFormat::Json => {
            let entries: serde_json::Map<String, serde_json::Value> = info
                .iter()
                .map(|(key, value)| Ok((key.to_string(), serde_json::to_value(value)?)))
                .collect::<Result<_, serde_json::Error>>()?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}

/// Implements `rrdshim fetch <file>`.
fn cmd_fetch(
    client: &Client<rrdshim::Native>,
    file: &Path,
    cf: ConsolidationFn,
    range: &str,
    step: u64,
    format: &OutputFormat,
) -> CliResult<()> {
    let (start, end) = range_ending_now(range)?;
    let result = client.fetch(file, cf, start, end, step)?;

    match format {
        OutputFormat::Csv => {
            println!(
                "# file={}, cf={cf}, step={}, rows={}",
                file.display(),
                result.step,
                result.row_count
            );
            print_csv(&result.ds_names, result.rows());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}

/// Implements `rrdshim create <file>`.
fn cmd_create(
    client: &Client<rrdshim::Native>,
    file: PathBuf,
    step: u64,
    start: Option<i64>,
    data_sources: &[String],
    archives: &[String],
    overwrite: bool,
) -> CliResult<()> {
    let start = match start {
        Some(start) => start,
        None => now()? - 10,
    };

    let mut creator = Creator::new(file, start, step);
    creator.overwrite(overwrite);
    for ds in data_sources {
        add_data_source(&mut creator, ds)?;
    }
    for rra in archives {
        add_archive(&mut creator, rra)?;
    }

    client.create(&creator)?;
    println!("Created {}", creator.path().display());
    Ok(())
}

/// Implements `rrdshim update <file> <rows...>`.
fn cmd_update(
    client: &Client<rrdshim::Native>,
    file: PathBuf,
    rows: Vec<String>,
    template: Option<&str>,
) -> CliResult<()> {
    let mut updater = Updater::new(file);
    if let Some(template) = template {
        let names: Vec<&str> = template.split(':').collect();
        updater.set_template(&names);
    }
    let count = rows.len();
    for row in rows {
        updater.cache_line(row);
    }

    client.update(&mut updater)?;
    println!("Updated {} with {count} rows", updater.path().display());
    Ok(())
}

/// Implements `rrdshim xport`.
#[allow(clippy::too_many_arguments)]
fn cmd_xport(
    client: &Client<rrdshim::Native>,
    defs: &[String],
    cdefs: &[String],
    columns: &[String],
    range: &str,
    step: u64,
    max_rows: Option<u32>,
    format: &OutputFormat,
) -> CliResult<()> {
    let mut exporter = Exporter::new();
    if let Some(rows) = max_rows {
        exporter.set_max_rows(rows);
    }

    let mut def_names = Vec::with_capacity(defs.len());
    for def in defs {
        let (vname, file, ds, cf) = parse_def(def)?;
        exporter.def(vname, Path::new(file), ds, cf);
        def_names.push(vname);
    }
    for cdef in cdefs {
        let (vname, rpn) = cdef
            .split_once('=')
            .ok_or_else(|| format!("Invalid CDEF '{cdef}'. Use vname=rpn."))?;
        exporter.cdef(vname, rpn);
    }
    if columns.is_empty() {
        for vname in def_names {
            exporter.xport(vname, vname);
        }
    } else {
        for column in columns {
            let column = column.as_str();
            let (vname, label) = column.split_once(':').unwrap_or((column, column));
            exporter.xport(vname, label);
        }
    }

    let (start, end) = range_ending_now(range)?;
    let result = client.xport(&exporter, start, end, step)?;

    match format {
        OutputFormat::Csv => {
            println!("# step={}, rows={}", result.step, result.row_count);
            print_csv(&result.legends, result.rows());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}

/// Prints a header and one line per row; unknown values print as empty cells.
fn print_csv<'a>(columns: &[String], rows: impl Iterator<Item = (i64, &'a [f64])>) {
    println!("timestamp,{}", columns.join(","));
    for (ts, values) in rows {
        let cells: Vec<String> = values
            .iter()
            .map(|v| if v.is_nan() { String::new() } else { v.to_string() })
            .collect();
        println!("{ts},{}", cells.join(","));
    }
}

/// Parses `name:TYPE:heartbeat:min:max` or `name:COMPUTE:rpn`.
fn add_data_source(creator: &mut Creator, def: &str) -> CliResult<()> {
    let mut parts = def.splitn(3, ':');
    let (Some(name), Some(kind), Some(rest)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("Invalid data source '{def}'. Use name:TYPE:heartbeat:min:max.").into());
    };

    let ds_type: DsType = kind.parse()?;
    if ds_type == DsType::Compute {
        creator.compute(name, rest);
        return Ok(());
    }

    let fields: Vec<&str> = rest.split(':').collect();
    let [heartbeat, min, max] = fields.as_slice() else {
        return Err(format!("Invalid data source '{def}'. Use name:TYPE:heartbeat:min:max.").into());
    };
    creator.ds(
        name,
        ds_type,
        heartbeat.parse()?,
        parse_bound(min)?,
        parse_bound(max)?,
    );
    Ok(())
}

/// Parses `CF:xff:steps:rows`.
fn add_archive(creator: &mut Creator, def: &str) -> CliResult<()> {
    let fields: Vec<&str> = def.split(':').collect();
    let [cf, xff, steps, rows] = fields.as_slice() else {
        return Err(format!("Invalid archive '{def}'. Use CF:xff:steps:rows.").into());
    };
    creator.rra(cf.parse()?, xff.parse()?, steps.parse()?, rows.parse()?);
    Ok(())
}

/// `U` is an unknown bound.
fn parse_bound(s: &str) -> CliResult<Option<f64>> {
    if s.eq_ignore_ascii_case("U") {
        Ok(None)
    } else {
        Ok(Some(s.parse()?))
    }
}

/// Parses `vname=file:ds:CF`. The file may contain colons; the last two
/// fields are the data source and consolidation function.
fn parse_def(def: &str) -> CliResult<(&str, &str, &str, ConsolidationFn)> {
    let invalid = || format!("Invalid DEF '{def}'. Use vname=file:ds:CF.");
    let (vname, rest) = def.split_once('=').ok_or_else(invalid)?;
    let mut fields = rest.rsplitn(3, ':');
    let (Some(cf), Some(ds), Some(file)) = (fields.next(), fields.next(), fields.next()) else {
        return Err(invalid().into());
    };
    Ok((vname, file, ds, cf.parse()?))
}

/// Returns `(now - range, now)` in seconds since the epoch.
fn range_ending_now(range: &str) -> CliResult<(i64, i64)> {
    let span = i64::try_from(parse_duration(range)?)?;
    let end = now()?;
    Ok((end.saturating_sub(span), end))
}

fn now() -> CliResult<i64> {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs();
    Ok(i64::try_from(secs)?)
}

/// Parses a human-readable duration string (e.g., "1h", "30m", "7d") to seconds.
fn parse_duration(s: &str) -> CliResult<u64> {
    let s = s.trim();
    let Some((split, unit)) = s.char_indices().last() else {
        return Err("Empty duration string".into());
    };

    let multiplier: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        _ => return Err(format!("Unknown duration unit: '{unit}'. Use s, m, h, or d.").into()),
    };
    let num: u64 = s[..split].parse()?;

    Ok(num
        .checked_mul(multiplier)
        .ok_or_else(|| format!("Duration '{s}' is too large"))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90s").unwrap(), 90);
        assert_eq!(parse_duration("2h").unwrap(), 7200);
        assert!(parse_duration("3w").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_parse_duration_rejects_bad_input() {
        assert!(parse_duration("5µ").is_err());
        assert!(parse_duration("µ").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("999999999999999999d").is_err());
        assert_eq!(parse_duration(" 7d ").unwrap(), 604_800);
    }

    #[test]
    fn test_parse_def_keeps_colons_in_path() {
        let (vname, file, ds, cf) = parse_def("in=C:/rrd/net.rrd:in:MAX").unwrap();
        assert_eq!((vname, file, ds, cf), ("in", "C:/rrd/net.rrd", "in", ConsolidationFn::Max));
        assert!(parse_def("in=net.rrd").is_err());
    }

    #[test]
    fn test_data_source_and_archive() {
        let mut creator = Creator::new("x.rrd", 0, 60);
        add_data_source(&mut creator, "in:COUNTER:120:0:U").unwrap();
        add_data_source(&mut creator, "sum:COMPUTE:in,2,*").unwrap();
        add_archive(&mut creator, "AVERAGE:0.5:1:1440").unwrap();
        assert_eq!(
            creator.definitions(),
            [
                "DS:in:COUNTER:120:0:U",
                "DS:sum:COMPUTE:in,2,*",
                "RRA:AVERAGE:0.5:1:1440"
            ]
        );
        assert!(add_data_source(&mut creator, "in:GAUGE:120").is_err());
        assert!(add_archive(&mut creator, "AVERAGE:0.5").is_err());
    }
}
