use anyhow::{Context, Result, anyhow, bail};
use plasmid_assembler::{
    about,
    export::{self, ExportFormat},
    feature::FeatureKind,
    fusion::{Linker, fuse},
    genbank, mcs,
    pipeline::{DesignRequest, design},
    record::SequenceRecord,
    resolver::{Catalog, RecordResolver},
    sequence::SequenceStats,
};
use serde::Serialize;
use std::{env, fs, path::Path};
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct Capabilities {
    commands: Vec<&'static str>,
    formats: Vec<ExportFormat>,
    feature_kinds: Vec<FeatureKind>,
    mcs_enzymes: Vec<&'static str>,
}

#[derive(Serialize)]
struct McsReport {
    id: String,
    bounds: Option<mcs::McsBounds>,
    insertion_site: Option<mcs::InsertionSite>,
}

fn usage() {
    eprintln!(
        "Usage:\n  \
  plasmid_cli --version\n  \
  plasmid_cli capabilities\n  \
  plasmid_cli parse FILE\n  \
  plasmid_cli stats SEQUENCE|FILE\n  \
  plasmid_cli mcs FILE\n  \
  plasmid_cli fuse [--linker SEQ] [--format raw|fasta|genbank] FILE...\n  \
  plasmid_cli [--catalog PATH] design '<request-json>' [--out PATH]\n\n  \
  Tip: pass @file.json instead of inline JSON; RUST_LOG=debug for progress on stderr"
    );
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_json_arg(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("Could not read JSON file '{path}'")),
        None => Ok(value.to_string()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Could not serialize JSON output")?;
    println!("{text}");
    Ok(())
}

/// Reads every record in a GenBank, FASTA or JSON catalog file.
fn load_records(path: &str) -> Result<Vec<SequenceRecord>> {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if extension == "json" {
        let catalog = Catalog::from_json_file(path).with_context(|| format!("Could not load catalog '{path}'"))?;
        return Ok(catalog.ids().iter().filter_map(|id| catalog.resolve(id)).collect());
    }
    let text = fs::read_to_string(path).with_context(|| format!("Could not read '{path}'"))?;
    let records = match extension.as_str() {
        "gb" | "gbk" | "genbank" => genbank::parse_many(&text),
        "fa" | "fasta" | "fna" => export::parse_fasta(&text),
        _ if text.trim_start().starts_with("LOCUS") => genbank::parse_many(&text),
        _ if text.trim_start().starts_with('>') => export::parse_fasta(&text),
        _ => bail!("Could not tell the format of '{path}', use .gb, .fasta or .json"),
    };
    records.with_context(|| format!("Could not parse '{path}'"))
}

fn load_first(path: &str) -> Result<SequenceRecord> {
    load_records(path)?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No records in '{path}'"))
}

fn parse_global_catalog_arg(args: &[String]) -> (Option<String>, usize) {
    if args.len() >= 3 && args[1] == "--catalog" {
        return (Some(args[2].clone()), 3);
    }
    (None, 1)
}

/// Finds the value following `flag` and removes both from `args`.
fn take_flag(args: &mut Vec<String>, flag: &str) -> Result<Option<String>> {
    let Some(idx) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    if idx + 1 >= args.len() {
        bail!("{flag} needs a value");
    }
    let value = args.remove(idx + 1);
    args.remove(idx);
    Ok(Some(value))
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        bail!("Missing command");
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }

    let (catalog_path, cmd_idx) = parse_global_catalog_arg(&args);
    if args.len() <= cmd_idx {
        usage();
        bail!("Missing command");
    }
    let command = args[cmd_idx].as_str();
    let mut rest: Vec<String> = args[cmd_idx + 1..].to_vec();

    match command {
        "capabilities" => print_json(&Capabilities {
            commands: vec!["capabilities", "parse", "stats", "mcs", "fuse", "design"],
            formats: vec![ExportFormat::Raw, ExportFormat::Fasta, ExportFormat::GenBank],
            feature_kinds: vec![
                FeatureKind::Promoter,
                FeatureKind::Origin,
                FeatureKind::ResistanceMarker,
                FeatureKind::PolyASignal,
                FeatureKind::Mcs,
                FeatureKind::Cds,
                FeatureKind::Other,
            ],
            mcs_enzymes: mcs::COMMON_MCS_ENZYMES.iter().map(|(name, _)| *name).collect(),
        }),
        "parse" => {
            let Some(path) = rest.first() else {
                usage();
                bail!("parse requires a FILE");
            };
            print_json(&load_records(path)?)
        }
        "stats" => {
            let Some(value) = rest.first() else {
                usage();
                bail!("stats requires a SEQUENCE or FILE");
            };
            if Path::new(value).is_file() {
                let stats: Vec<(String, SequenceStats)> = load_records(value)?
                    .iter()
                    .map(|r| (r.id().to_string(), r.stats()))
                    .collect();
                print_json(&stats)
            } else {
                print_json(&SequenceStats::from_text(value))
            }
        }
        "mcs" => {
            let Some(path) = rest.first() else {
                usage();
                bail!("mcs requires a FILE");
            };
            let reports: Vec<McsReport> = load_records(path)?
                .iter()
                .map(|record| McsReport {
                    id: record.id().to_string(),
                    bounds: mcs::find_mcs_boundaries(record.as_bytes(), mcs::DEFAULT_MAX_GAP),
                    insertion_site: mcs::suggest_insertion_site(record),
                })
                .collect();
            print_json(&reports)
        }
        "fuse" => {
            let linker = take_flag(&mut rest, "--linker")?;
            let format = match take_flag(&mut rest, "--format")? {
                Some(name) => name.parse::<ExportFormat>().map_err(|e| anyhow!(e))?,
                None => ExportFormat::Fasta,
            };
            if rest.len() < 2 {
                usage();
                bail!("fuse requires at least two FILEs");
            }
            let parts = rest.iter().map(|path| load_first(path)).collect::<Result<Vec<_>>>()?;
            let fused = fuse(&parts, &Linker::from(linker.as_deref())).context("Fusion failed")?;
            print!("{}", export::export_record(&fused, format));
            Ok(())
        }
        "design" => {
            let out = take_flag(&mut rest, "--out")?;
            let Some(json) = rest.first() else {
                usage();
                bail!("Missing design request JSON");
            };
            let json = load_json_arg(json)?;
            let mut request: DesignRequest =
                serde_json::from_str(&json).context("Invalid design request JSON")?;
            if let Some(reference) = request.ground_truth.as_deref().filter(|r| Path::new(r).is_file()) {
                request.ground_truth = Some(load_first(reference)?.sequence().to_string());
            }

            let catalog = match &catalog_path {
                Some(path) => Catalog::from_json_file(path).with_context(|| format!("Could not load catalog '{path}'"))?,
                None => Catalog::default(),
            };
            // Ids naming an existing file are read from disk, anything else goes to the catalog.
            let resolver = |id: &str| -> Option<SequenceRecord> {
                if Path::new(id).is_file() {
                    load_first(id).ok()
                } else {
                    catalog.resolve(id)
                }
            };
            let outcome = design(&request, &resolver).context("Design failed")?;
            if let Some(out) = out {
                fs::write(&out, &outcome.exported).with_context(|| format!("Could not write '{out}'"))?;
                eprintln!("Wrote {} to '{out}'", request.format);
            }
            eprintln!("{}", outcome.report.summary());
            print_json(&outcome)
        }
        _ => {
            usage();
            bail!("Unknown command '{command}'")
        }
    }
}
