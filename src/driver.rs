use crate::scorer::{LineScore, ScoreOutcome, Scorer};
use anyhow::{Context, Result};
use log::{debug, info};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File as AsyncFile;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Config {
    pub corpus: PathBuf,
    pub lm: PathBuf,
    pub token_type: String,
    /// Lines scored concurrently; 1 scores sequentially.
    pub jobs: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub read: usize,
    pub scored: usize,
    pub skipped: usize,
}

/// Quotes a TSV field the way CSV writers do when it holds a delimiter,
/// a quote or a line break.
pub fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains(['\t', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Formats one output row, or `None` for a skipped line.
pub fn format_row(score: &LineScore) -> Option<String> {
    score
        .outcome
        .bits_per_char()
        .map(|bits| format!("{:?}\t{}\n", bits, quote_field(&score.line)))
}

/// Splits a chunk read up to and including `\n` into lines, treating
/// `\r\n`, `\r` and `\n` all as line endings.
fn split_universal(chunk: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rest = chunk;
    while let Some(pos) = rest.find(['\r', '\n']) {
        lines.push(rest[..pos].to_string());
        let ending = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[pos + ending..];
    }
    if !rest.is_empty() {
        lines.push(rest.to_string());
    }
    lines
}

/// Corpus lines, ending in `\n`, `\r\n` or a bare `\r`.
struct CorpusLines<R> {
    reader: R,
    buf: String,
    pending: VecDeque<String>,
}

impl<R: AsyncBufRead + Unpin> CorpusLines<R> {
    fn new(reader: R) -> Self {
        CorpusLines {
            reader,
            buf: String::new(),
            pending: VecDeque::new(),
        }
    }

    async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Ok(Some(line));
            }
            self.buf.clear();
            if self.reader.read_line(&mut self.buf).await? == 0 {
                return Ok(None);
            }
            self.pending.extend(split_universal(&self.buf));
        }
    }
}

struct Emitter<'a, W> {
    out: &'a mut W,
    summary: RunSummary,
}

impl<'a, W: AsyncWrite + Unpin> Emitter<'a, W> {
    async fn emit(&mut self, score: LineScore) -> Result<()> {
        self.summary.read += 1;
        match format_row(&score) {
            Some(row) => {
                self.summary.scored += 1;
                self.out.write_all(row.as_bytes()).await?;
            }
            None => {
                self.summary.skipped += 1;
                if let ScoreOutcome::Skipped(reason) = &score.outcome {
                    debug!("Skipping line {}: {}", self.summary.read, reason);
                }
            }
        }
        Ok(())
    }
}

async fn join(handle: JoinHandle<Result<LineScore>>) -> Result<LineScore> {
    match handle.await {
        Ok(result) => result,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(err).context("Scoring task was cancelled"),
    }
}

/// Scores every line of `corpus`, writing `<bits_per_char>\t<line>` rows to
/// `out` in corpus order. Lines the model cannot score are left out.
pub async fn score_corpus<W>(
    scorer: Arc<Scorer>,
    corpus: &Path,
    jobs: usize,
    out: &mut W,
) -> Result<RunSummary>
where
    W: AsyncWrite + Unpin,
{
    let file = AsyncFile::open(corpus)
        .await
        .with_context(|| format!("Failed to open corpus {}", corpus.display()))?;
    let mut lines = CorpusLines::new(tokio::io::BufReader::new(file));
    let mut emitter = Emitter {
        out,
        summary: RunSummary::default(),
    };

    if jobs <= 1 {
        while let Some(line) = lines.next_line().await? {
            let score = scorer.score_line(&line)?;
            emitter.emit(score).await?;
        }
    } else {
        let mut pending: VecDeque<JoinHandle<Result<LineScore>>> =
            VecDeque::with_capacity(jobs);
        while let Some(line) = lines.next_line().await? {
            let scorer = Arc::clone(&scorer);
            pending.push_back(tokio::task::spawn_blocking(move || scorer.score_line(&line)));
            if pending.len() >= jobs {
                if let Some(handle) = pending.pop_front() {
                    emitter.emit(join(handle).await?).await?;
                }
            }
        }
        while let Some(handle) = pending.pop_front() {
            emitter.emit(join(handle).await?).await?;
        }
    }

    emitter.out.flush().await?;
    Ok(emitter.summary)
}

/// Loads the model named by `config` and scores its corpus into `out`.
pub async fn run<W>(config: &Config, out: &mut W) -> Result<RunSummary>
where
    W: AsyncWrite + Unpin,
{
    let start_time = std::time::Instant::now();
    let scorer = Scorer::from_files(config.lm.clone(), config.token_type.clone()).await?;
    let summary = score_corpus(Arc::new(scorer), &config.corpus, config.jobs, out).await?;
    info!(
        "Scored {} of {} lines ({} skipped) in {:.2?}",
        summary.scored,
        summary.read,
        summary.skipped,
        start_time.elapsed()
    );
    Ok(summary)
}
