use futures::future::join_all;

use gt_compiler::{compile_rules, extract_patterns, PatternSet};
use gt_core::schedule::UpdateTrigger;
use gt_core::types::{rule_ids_up_to, FilterSource, MAX_RULES};

use crate::applier::{ApplyError, RuleApplier};
use crate::fetcher::{ListFetcher, Transport};
use crate::scheduler::{Admission, Scheduler};

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub name: String,
    pub lines: usize,
    pub patterns: usize,
}

#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub sources: Vec<SourceReport>,
    pub patterns_before: usize,
    pub deduped: usize,
    pub truncated: usize,
    pub rules: usize,
    /// Rules active in the host afterwards
    pub active: usize,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    /// Rules are fresh enough
    Skipped,
    /// Another run is in flight
    Busy,
    Applied(UpdateReport),
    Failed(ApplyError),
}

/// Fetch → extract → build → apply, gated by the scheduler.
pub struct UpdatePipeline<T, A> {
    fetcher: ListFetcher<T>,
    applier: A,
    scheduler: Scheduler,
    sources: Vec<FilterSource>,
    max_rules: usize,
}

impl<T: Transport, A: RuleApplier> UpdatePipeline<T, A> {
    pub fn new(
        fetcher: ListFetcher<T>,
        applier: A,
        scheduler: Scheduler,
        sources: Vec<FilterSource>,
        max_rules: usize,
    ) -> Self {
        Self {
            fetcher,
            applier,
            scheduler,
            sources,
            max_rules: max_rules.min(MAX_RULES),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub async fn trigger(&self, trigger: UpdateTrigger, now: u64) -> UpdateOutcome {
        let _guard = match self.scheduler.admit(trigger, now) {
            Admission::Granted(guard) => guard,
            Admission::Skipped => return UpdateOutcome::Skipped,
            Admission::Busy => return UpdateOutcome::Busy,
        };

        log::info!("Updating ad-block rules ({} trigger)", trigger.as_str());
        match self.build_and_apply(now).await {
            Ok(report) => UpdateOutcome::Applied(report),
            Err(e) => {
                log::error!("Failed to apply rules: {}", e);
                UpdateOutcome::Failed(e)
            }
        }
    }

    /// Fetch and extract every source concurrently. A failed source yields an
    /// empty set.
    pub async fn fetch_all(&self) -> Vec<(SourceReport, PatternSet)> {
        join_all(self.sources.iter().map(|source| async move {
            let text = self.fetcher.fetch_text(source).await;
            let patterns = extract_patterns(&text);
            log::info!("{}: {} patterns", source.name, patterns.len());
            let report = SourceReport {
                name: source.name.clone(),
                lines: text.lines().count(),
                patterns: patterns.len(),
            };
            (report, patterns)
        }))
        .await
    }

    async fn build_and_apply(&self, now: u64) -> Result<UpdateReport, ApplyError> {
        let (sources, sets): (Vec<_>, Vec<_>) = self.fetch_all().await.into_iter().unzip();

        let output = compile_rules(sets, self.max_rules);
        let rules = output.rules.len();
        log::info!("Total unique patterns: {}", rules);

        // Clear every slot the host allows, not just this run's cap.
        let remove_ids = rule_ids_up_to(MAX_RULES);
        let active = self.applier.replace_rules(&remove_ids, output.rules).await?;
        log::info!("Applied {} blocking rules", rules);
        self.scheduler.record_success(now);

        Ok(UpdateReport {
            sources,
            patterns_before: output.stats.before,
            deduped: output.stats.deduped,
            truncated: output.stats.truncated,
            rules,
            active,
        })
    }
}
