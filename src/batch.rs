//! Concurrent synthesis of many segments.
//!
//! Every submitted text yields exactly one [`BatchItem`], keyed by its input
//! index. Items arrive in completion order; [`BatchReport::into_input_order`]
//! restores the order of submission.

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::error::{GermanizerError, Result};
use crate::segment::{AudioArtifact, SegmentGenerator, SNIPPET_CHARS};
use crate::text::snippet;

#[derive(Debug)]
pub enum ItemOutcome {
    Completed(AudioArtifact),
    Failed { reason: String },
}

#[derive(Debug)]
pub struct BatchItem {
    /// Position of the text in the submitted batch
    pub index: usize,
    pub snippet: String,
    pub outcome: ItemOutcome,
}

impl BatchItem {
    pub fn artifact(&self) -> Option<&AudioArtifact> {
        match &self.outcome {
            ItemOutcome::Completed(artifact) => Some(artifact),
            ItemOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    items: Vec<BatchItem>,
}

impl BatchReport {
    /// Items in completion order.
    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &AudioArtifact> {
        self.items.iter().filter_map(BatchItem::artifact)
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchItem> {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ItemOutcome::Failed { .. }))
    }

    pub fn into_input_order(mut self) -> Vec<BatchItem> {
        self.items.sort_by_key(|item| item.index);
        self.items
    }
}

/// Fans segment generation out over a bounded number of concurrent workers.
pub struct BatchOrchestrator {
    generator: SegmentGenerator,
    show_progress: bool,
}

impl BatchOrchestrator {
    pub fn new(generator: SegmentGenerator) -> Self {
        Self {
            generator,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Synthesize every text without timing constraints.
    pub async fn generate_batch(&self, texts: &[String], max_workers: usize) -> Result<BatchReport> {
        check_workers(max_workers)?;
        let jobs = texts.iter().enumerate().map(|(i, text)| (i, text.as_str(), None));
        Ok(self.run(jobs, texts.len(), max_workers).await)
    }

    /// Synthesize every text and fit it into the matching target duration.
    pub async fn generate_batch_with_timing(
        &self,
        texts: &[String],
        target_durations: &[f64],
        max_workers: usize,
    ) -> Result<BatchReport> {
        if texts.len() != target_durations.len() {
            return Err(GermanizerError::BatchLengthMismatch {
                texts: texts.len(),
                durations: target_durations.len(),
            });
        }
        check_workers(max_workers)?;

        let jobs = texts
            .iter()
            .zip(target_durations)
            .enumerate()
            .map(|(i, (text, target))| (i, text.as_str(), Some(*target)));
        Ok(self.run(jobs, texts.len(), max_workers).await)
    }

    async fn run<'a, I>(&'a self, jobs: I, total: usize, max_workers: usize) -> BatchReport
    where
        I: Iterator<Item = (usize, &'a str, Option<f64>)>,
    {
        info!("Generating {} segments with {} workers", total, max_workers);
        let progress = self.progress_bar(total);

        let items: Vec<BatchItem> = stream::iter(jobs.map(|(index, text, target)| {
            let generator = &self.generator;
            let progress = progress.clone();
            async move {
                let result = match target {
                    Some(target) => generator.generate(text, target).await,
                    None => generator.generate_untimed(text).await,
                };

                let outcome = match result {
                    Ok(artifact) => ItemOutcome::Completed(artifact),
                    Err(e) => {
                        warn!("Segment {} failed: {}", index, e);
                        ItemOutcome::Failed { reason: e.to_string() }
                    }
                };
                progress.inc(1);

                BatchItem {
                    index,
                    snippet: snippet(text, SNIPPET_CHARS),
                    outcome,
                }
            }
        }))
        .buffer_unordered(max_workers)
        .collect()
        .await;

        progress.finish_and_clear();

        let report = BatchReport { items };
        let failed = report.failures().count();
        info!("Batch finished: {} succeeded, {} failed", report.len() - failed, failed);
        report
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

fn check_workers(max_workers: usize) -> Result<()> {
    if max_workers == 0 {
        return Err(GermanizerError::Config("max_workers must be at least 1".to_string()));
    }
    Ok(())
}
