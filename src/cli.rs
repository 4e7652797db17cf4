use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Cell, Table};
use tracing::{info, warn};

use crate::config::{self, AudioCodec, Config};
use crate::core::dispatcher::Dispatcher;
use crate::core::ledger::Ledger;
use crate::core::parser;
use crate::core::postprocess::Ffmpeg;
use crate::core::progress::{Reporter, Summary};
use crate::core::resolver::Resolver;
use crate::core::retry::RetryPolicy;
use crate::core::scanner;
use crate::error::{ItemError, StartupError};
use crate::models::{DownloadResult, DownloadStatus, InputEntry};
use crate::sources::ytdlp::YtDlp;

/// 항목별 리포트에서 잘리기 전 제목의 최대 길이.
const REPORT_TITLE_WIDTH: usize = 40;
/// 항목마다 나열하는 제목 수. 나머지는 개수로만 표시한다.
const REPORT_MAX_TITLES: usize = 3;

#[derive(Parser, Debug)]
#[command(
    name = "tunefetch",
    version,
    about = "Batch-download songs, artists and playlists as tagged audio files"
)]
pub struct Cli {
    /// 입력 목록 파일 (한 줄에 "아티스트 - 제목", 아티스트 이름 또는 URL)
    #[arg(short, long, default_value = "input.txt")]
    pub input: PathBuf,

    /// 출력 디렉토리 (없으면 생성)
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// 동시 작업 수
    #[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    pub threads: u32,

    /// 아티스트 항목마다 받을 곡 수
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub top: u32,

    /// 이미 있는 파일도 다시 다운로드
    #[arg(long)]
    pub force: bool,

    /// 설정 파일 (기본: ~/.config/tunefetch/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 출력 코덱 (설정 파일보다 우선)
    #[arg(long, value_enum)]
    pub codec: Option<AudioCodec>,

    /// 목표 비트레이트, 예: 192k (설정 파일보다 우선)
    #[arg(long)]
    pub bitrate: Option<String>,

    /// 로그 상세도 (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// 설정 파일을 읽고 명령행 옵션으로 덮어쓴다.
    fn effective_config(&self) -> Result<Config> {
        let mut cfg = config::load_config(self.config.as_deref())?;
        if let Some(codec) = self.codec {
            cfg.download.codec = codec;
        }
        if let Some(ref bitrate) = self.bitrate {
            cfg.download.bitrate = bitrate.clone();
        }
        Ok(cfg)
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let started = Instant::now();
    let cfg = cli.effective_config()?;

    if !cli.input.is_file() {
        return Err(StartupError::MissingInput(cli.input.clone()).into());
    }
    let content = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("cannot read {}", cli.input.display()))?;
    let parsed = parser::parse_input(&content);
    for warning in &parsed.warnings {
        warn!(line = warning.line, text = %warning.text, "{}", warning.message);
    }
    if parsed.entries.is_empty() {
        return Err(StartupError::EmptyInput(cli.input.clone()).into());
    }

    let work = scanner::work_dir(&cli.output);
    let ytdlp = YtDlp::new(&cfg.tools.ytdlp);
    let ffmpeg = Ffmpeg::new(&cfg.tools.ffmpeg, &cfg.download, &cli.output, &work)?;
    let ytdlp_version = ytdlp.version()?;
    let ffmpeg_version = ffmpeg.version()?;
    info!(version = %ytdlp_version, "found yt-dlp");
    info!(version = %ffmpeg_version, "found ffmpeg");

    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("cannot create output directory {}", cli.output.display()))?;
    let removed = scanner::cleanup_partials(&cli.output)?;
    if removed > 0 {
        info!(removed, "removed leftovers of an interrupted run");
    }
    std::fs::create_dir_all(&work)
        .with_context(|| format!("cannot create {}", work.display()))?;

    let ledger = Ledger::with_existing(cli.force, scanner::scan_existing(&cli.output)?);
    if !cli.force && ledger.existing_count() > 0 {
        println!("Found {} already downloaded files", ledger.existing_count());
    }
    println!("{}", config_table(&cli, &cfg, &parsed.entries));

    let threads = cli.threads as usize;
    let retry = RetryPolicy::new(cfg.download.retries, cfg.download.retry_delay());
    let reporter = Reporter::new(std::io::stderr().is_terminal());

    let resolver = Resolver::new(&ytdlp, &cfg.search, cli.top as usize, retry);
    let resolution = resolver.resolve_all(parsed.entries.clone(), threads, &reporter);

    let dispatcher = Dispatcher::new(&ytdlp, &ffmpeg, &ledger, &reporter, retry, &work);
    let results = dispatcher.run(resolution.targets, threads);
    let summary = reporter.finish();

    if let Err(e) = std::fs::remove_dir_all(&work) {
        warn!(dir = %work.display(), error = %e, "cannot remove work directory");
    }

    let reports = summarize_entries(&parsed.entries, &results, &resolution.failures);
    println!();
    println!("Download summary by entry:");
    println!("{}", report_table(&reports));
    println!();
    println!("{}", totals_table(&summary, started.elapsed(), &cli.output));

    Ok(())
}

fn config_table(cli: &Cli, cfg: &Config, entries: &[InputEntry]) -> Table {
    let count = |label: &str| entries.iter().filter(|e| e.kind.label() == label).count();
    let yes_no = |flag: bool| if flag { "Yes" } else { "No" };

    let mut table = Table::new();
    table.set_header(vec!["Parameter", "Value"]);
    let rows: Vec<(&str, String)> = vec![
        ("Input file", cli.input.display().to_string()),
        ("Output directory", cli.output.display().to_string()),
        ("Threads", cli.threads.to_string()),
        ("Top results", cli.top.to_string()),
        ("Codec", format!("{} ({})", cfg.download.codec.extension(), cfg.download.bitrate)),
        ("Total entries", entries.len().to_string()),
        ("Songs", count("Song").to_string()),
        ("Artists", count("Artist").to_string()),
        ("URLs", count("URL").to_string()),
        ("Force mode", yes_no(cli.force).to_string()),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    table
}

/// 입력 한 줄의 처리 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EntryReport {
    line: usize,
    kind: &'static str,
    raw: String,
    downloaded: Vec<String>,
    skipped: usize,
    failed: usize,
    error: Option<String>,
}

fn summarize_entries(
    entries: &[InputEntry],
    results: &[DownloadResult],
    failures: &[(Arc<InputEntry>, ItemError)],
) -> Vec<EntryReport> {
    let mut reports: Vec<EntryReport> = entries
        .iter()
        .map(|entry| EntryReport {
            line: entry.line,
            kind: entry.kind.label(),
            raw: entry.raw.clone(),
            downloaded: Vec::new(),
            skipped: 0,
            failed: 0,
            error: None,
        })
        .collect();
    reports.sort_by_key(|r| r.line);

    for result in results {
        let Some(idx) = position(&reports, result.target.entry.line) else {
            continue;
        };
        let report = &mut reports[idx];
        match &result.status {
            DownloadStatus::Success(_) => report.downloaded.push(result.target.display_name()),
            DownloadStatus::Skipped(_) => report.skipped += 1,
            DownloadStatus::Failed(_) => report.failed += 1,
        }
    }
    for (entry, error) in failures {
        if let Some(idx) = position(&reports, entry.line) {
            reports[idx].error = Some(error.to_string());
        }
    }
    reports
}

fn position(reports: &[EntryReport], line: usize) -> Option<usize> {
    reports.binary_search_by_key(&line, |r| r.line).ok()
}

fn quote_title(title: &str) -> String {
    if title.chars().count() > REPORT_TITLE_WIDTH {
        let cut: String = title.chars().take(REPORT_TITLE_WIDTH).collect();
        format!("'{}...'", cut)
    } else {
        format!("'{}'", title)
    }
}

fn describe_downloads(titles: &[String]) -> String {
    if titles.is_empty() {
        return "none".to_string();
    }
    let shown: Vec<String> = titles
        .iter()
        .take(REPORT_MAX_TITLES)
        .map(|t| quote_title(t))
        .collect();
    let mut text = shown.join(", ");
    if titles.len() > REPORT_MAX_TITLES {
        text.push_str(&format!(" and {} more songs", titles.len() - REPORT_MAX_TITLES));
    }
    text
}

fn result_cell(report: &EntryReport) -> String {
    if let Some(ref error) = report.error {
        return format!("failed: {}", error);
    }
    let mut text = format!(
        "{} ({})",
        report.downloaded.len(),
        describe_downloads(&report.downloaded)
    );
    if report.skipped > 0 {
        text.push_str(&format!(", {} skipped", report.skipped));
    }
    if report.failed > 0 {
        text.push_str(&format!(", {} failed", report.failed));
    }
    text
}

fn report_table(reports: &[EntryReport]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Line", "Type", "Entry", "Downloaded Songs"]);
    for report in reports {
        table.add_row(vec![
            Cell::new(report.line),
            Cell::new(report.kind),
            Cell::new(&report.raw),
            Cell::new(result_cell(report)),
        ]);
    }
    table
}

fn totals_table(summary: &Summary, elapsed: Duration, output: &Path) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Result", "Count"]);
    let rows = [
        ("Targets", summary.targets.to_string()),
        ("Downloaded", summary.done.to_string()),
        ("Skipped", summary.skipped.to_string()),
        ("Unresolved entries", summary.unresolved.to_string()),
        ("Download failures", summary.download_failed.to_string()),
        ("Post-processing failures", summary.postprocess_failed.to_string()),
        ("Total time", format!("{:.1}s", elapsed.as_secs_f64())),
        ("Files saved in", output.display().to_string()),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    table
}
