//! Run the parsing pipeline over a file.
//!
//! ```text
//! foreparse [--chunk BYTES] [--sync] [--no-scripts] [--url URL] [--config FILE] [--deadline SECS] [--json] FILE
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use html::dom_snapshot::{DomSnapshot, DomSnapshotOptions};
use html::html5::{FilterReport, ParseError};
use mimalloc::MiMalloc;
use runtime_parse::{
    Collaborators, Coordinator, DocumentWriteHost, Driver, Lifecycle, ParserConfig,
    PipelineStats, PumpStatus, RecordingLoader,
};
use serde::Serialize;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const USAGE: &str = "usage: foreparse [--chunk BYTES] [--sync] [--no-scripts] [--url URL] [--config FILE] [--deadline SECS] [--json] FILE";

#[derive(Debug, Default)]
struct Args {
    file: PathBuf,
    chunk: Option<usize>,
    sync: bool,
    no_scripts: bool,
    url: Option<String>,
    config: Option<PathBuf>,
    deadline: Option<Duration>,
    json: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut file = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--chunk" => {
                let value = args.next().ok_or("--chunk needs a byte count")?;
                let size = value
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| format!("bad chunk size {value:?}"))?;
                parsed.chunk = Some(size);
            }
            "--sync" => parsed.sync = true,
            "--no-scripts" => parsed.no_scripts = true,
            "--json" => parsed.json = true,
            "--url" => parsed.url = Some(args.next().ok_or("--url needs a value")?),
            "--config" => {
                parsed.config = Some(PathBuf::from(args.next().ok_or("--config needs a path")?));
            }
            "--deadline" => {
                let value = args.next().ok_or("--deadline needs seconds")?;
                let secs = value
                    .parse::<u64>()
                    .map_err(|_| format!("bad deadline {value:?}"))?;
                parsed.deadline = Some(Duration::from_secs(secs));
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with('-') => return Err(format!("unknown flag {flag}\n{USAGE}")),
            path => {
                if file.replace(PathBuf::from(path)).is_some() {
                    return Err(format!("more than one input file\n{USAGE}"));
                }
            }
        }
    }
    parsed.file = file.ok_or_else(|| USAGE.to_string())?;
    Ok(parsed)
}

#[derive(Serialize)]
struct Report<'a> {
    file: String,
    status: PumpStatus,
    lifecycle: Lifecycle,
    speculative: bool,
    stats: PipelineStats,
    preloads: Vec<String>,
    filtered: Vec<FilterReport>,
    diagnostics: &'a [ParseError],
    dom: &'a [String],
}

fn run(args: Args) -> Result<ExitCode, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => ParserConfig::from_toml_file(path)?,
        None => ParserConfig::default(),
    };
    if args.sync {
        config.speculative = false;
    }
    if args.no_scripts {
        config.scripting = false;
    }
    if args.url.is_some() {
        config.document_url = args.url.clone();
    }

    let bytes = std::fs::read(&args.file)?;
    let driver = match args.deadline {
        Some(deadline) => Driver::new().with_deadline(deadline),
        None => Driver::new(),
    };
    let loader = RecordingLoader::new();
    let collaborators = Collaborators {
        script_host: Box::new(DocumentWriteHost::new()),
        loader: Box::new(loader.clone()),
        wake: Some(driver.wake_hook()),
        ..Collaborators::default()
    };
    let mut coordinator = Coordinator::new(config, collaborators)?;
    log::info!(
        "parsing {} ({} bytes, {})",
        args.file.display(),
        bytes.len(),
        if coordinator.is_speculative() { "speculative" } else { "synchronous" }
    );

    let chunk = args.chunk.unwrap_or(bytes.len().max(1));
    let mut status = PumpStatus::NeedsInput;
    for piece in bytes.chunks(chunk) {
        coordinator.append_bytes(piece);
        status = driver.run_until_blocked(&mut coordinator);
        if status != PumpStatus::NeedsInput {
            break;
        }
    }
    if status == PumpStatus::NeedsInput {
        coordinator.mark_end_of_stream();
        status = driver.run_until_blocked(&mut coordinator);
    }
    if status != PumpStatus::Finished {
        log::warn!("pipeline stopped early: {status:?}");
    }

    let snapshot = DomSnapshot::new(&coordinator.dom(), DomSnapshotOptions::default());
    let stats = coordinator.stats();
    if args.json {
        let report = Report {
            file: args.file.display().to_string(),
            status,
            lifecycle: coordinator.lifecycle(),
            speculative: coordinator.is_speculative(),
            stats,
            preloads: loader.requests().into_iter().map(|r| r.url).collect(),
            filtered: coordinator.take_filter_reports(),
            diagnostics: coordinator.diagnostics(),
            dom: snapshot.as_lines(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", snapshot.render());
        for diagnostic in coordinator.diagnostics() {
            eprintln!("{diagnostic}");
        }
        log::info!(
            "{} tokens, {} chunks, {} rewinds, {} preloads",
            stats.tokens_committed,
            stats.chunks_received,
            stats.rewinds,
            stats.preloads_issued
        );
    }
    Ok(if status == PumpStatus::Finished {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };
    match run(args) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err}");
            eprintln!("foreparse: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn flags_and_file() {
        let parsed =
            args(&["--chunk", "7", "--sync", "page.html", "--deadline", "3", "--json"]).unwrap();
        assert_eq!(parsed.file, PathBuf::from("page.html"));
        assert_eq!(parsed.chunk, Some(7));
        assert_eq!(parsed.deadline, Some(Duration::from_secs(3)));
        assert!(parsed.sync && parsed.json && !parsed.no_scripts);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(args(&[]).is_err());
        assert!(args(&["--chunk", "0", "a.html"]).is_err());
        assert!(args(&["--bogus", "a.html"]).is_err());
        assert!(args(&["a.html", "b.html"]).is_err());
        assert!(args(&["--deadline", "soon", "a.html"]).is_err());
    }
}
