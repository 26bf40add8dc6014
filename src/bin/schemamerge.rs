use schemamerge::catalog::types::Engine;
use schemamerge::config::MergeConfig;
use schemamerge::diff::DiffScope;
use schemamerge::offline::{self, MergeFileSet};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("SCHEMAMERGE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return Err("missing command".into());
    }
    match args[1].as_str() {
        "merge" => cmd_merge(&args[2..]),
        "diff" => cmd_diff(&args[2..]),
        "fingerprint" => cmd_fingerprint(&args[2..]),
        other => {
            print_usage();
            Err(format!("unknown top-level command: {other}"))
        }
    }
}

fn cmd_merge(args: &[String]) -> Result<(), String> {
    let head = parse_flag_value(args, "--head").ok_or("--head is required")?;
    let base = parse_flag_value(args, "--base").ok_or("--base is required")?;
    let out = parse_flag_value(args, "--out").ok_or("--out is required")?;
    let files = MergeFileSet {
        ancestor: parse_flag_value(args, "--ancestor").map(PathBuf::from),
        head: PathBuf::from(head),
        base: PathBuf::from(base),
        ancestor_config: parse_flag_value(args, "--ancestor-config").map(PathBuf::from),
        head_config: parse_flag_value(args, "--head-config").map(PathBuf::from),
        base_config: parse_flag_value(args, "--base-config").map(PathBuf::from),
        out_schema: PathBuf::from(out),
        out_config: parse_flag_value(args, "--out-config").map(PathBuf::from),
    };
    let config = parse_merge_config(args)?;
    let report = offline::merge_files(&files, &config).map_err(|e| format!("merge: {e}"))?;
    println!(
        "ok\t{}\t{}\t{}\t{}\t{}\t{}",
        report.schema_fingerprint_hex,
        report.schemas,
        report.tables,
        report.views,
        report.functions,
        report.procedures
    );
    Ok(())
}

fn cmd_diff(args: &[String]) -> Result<(), String> {
    let from = parse_flag_value(args, "--from").ok_or("--from is required")?;
    let to = parse_flag_value(args, "--to").ok_or("--to is required")?;
    let scope = if args.iter().any(|a| a == "--tables-only") {
        DiffScope::TablesOnly
    } else {
        DiffScope::Full
    };
    let changes = offline::diff_files(Path::new(&from), Path::new(&to), scope)
        .map_err(|e| format!("diff: {e}"))?;
    for change in &changes {
        println!("{}\t{}\t{}", change.action, change.kind, change.path);
    }
    Ok(())
}

fn cmd_fingerprint(args: &[String]) -> Result<(), String> {
    let schema = parse_flag_value(args, "--schema").ok_or("--schema is required")?;
    let hex = offline::fingerprint_file(Path::new(&schema))
        .map_err(|e| format!("fingerprint: {e}"))?;
    println!("{hex}\t{schema}");
    Ok(())
}

fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
    let idx = args.iter().position(|a| a == flag)?;
    args.get(idx + 1).cloned()
}

fn parse_merge_config(args: &[String]) -> Result<MergeConfig, String> {
    let mut cfg = if args.iter().any(|a| a == "--tables-only") {
        MergeConfig::tables_only()
    } else {
        MergeConfig::default()
    };
    if let Some(engine) = parse_flag_value(args, "--engine") {
        let engine: Engine = engine.parse().map_err(|e| format!("invalid --engine: {e}"))?;
        cfg = cfg.with_engine(engine);
    }
    if args.iter().any(|a| a == "--no-align") {
        cfg.align_column_catalogs = false;
    }
    if let Some(limit) = parse_flag_value(args, "--max-objects") {
        cfg.max_schema_objects = limit
            .parse()
            .map_err(|e| format!("invalid --max-objects: {e}"))?;
    }
    cfg.validate().map_err(|e| e.to_string())?;
    Ok(cfg)
}

fn print_usage() {
    eprintln!("usage:");
    eprintln!(
        "  schemamerge merge --head <head.json> --base <base.json> --out <merged.json> \
         [--ancestor <ancestor.json>] [--head-config <cfg>] [--base-config <cfg>] \
         [--ancestor-config <cfg>] [--out-config <cfg>] [--engine <engine>] \
         [--tables-only] [--no-align] [--max-objects <n>]"
    );
    eprintln!("  schemamerge diff --from <a.json> --to <b.json> [--tables-only]");
    eprintln!("  schemamerge fingerprint --schema <schema.json>");
}
