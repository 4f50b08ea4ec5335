use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::{stream, StreamExt};
use harvester_core::{
    advance, ConfigError, ExtractedRecord, FailureKind, HarvestConfig, HarvestReport,
    NavigationPolicy, ReportBuilder, RetryPolicy, Target, TargetEvent, TargetKind,
    TargetState,
};
use tokio_util::sync::CancellationToken;

use crate::extract::{ContactEmailExtractor, ExtractContext, Extraction, Extractor, ListingExtractor};
use crate::Fetcher;

#[derive(Debug, Clone, Copy)]
struct KindPlan {
    navigation: NavigationPolicy,
    retry: RetryPolicy,
}

/// Drives every target through fetch and extraction with at most
/// `concurrency` targets in flight, and collects one record per target in
/// input order.
pub struct Coordinator {
    fetcher: Arc<dyn Fetcher>,
    listing: Arc<dyn Extractor>,
    contact: Arc<dyn Extractor>,
    listing_plan: KindPlan,
    contact_plan: KindPlan,
    concurrency: usize,
    timeout: Duration,
    deadline: Option<Duration>,
}

impl Coordinator {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &HarvestConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let plan = |kind| KindPlan {
            navigation: config.navigation_for(kind),
            retry: config.retry_for(kind),
        };
        Ok(Self {
            fetcher,
            listing: Arc::new(ListingExtractor::new(config.listing.selectors.clone())),
            contact: Arc::new(ContactEmailExtractor::new(&config.contact)),
            listing_plan: plan(TargetKind::ListingQuery),
            contact_plan: plan(TargetKind::SiteContact),
            concurrency: config.concurrency,
            timeout: config.timeout(),
            deadline: config.deadline(),
        })
    }

    /// Replace the extraction strategy for one target kind.
    pub fn with_extractor(mut self, kind: TargetKind, extractor: Arc<dyn Extractor>) -> Self {
        match kind {
            TargetKind::ListingQuery => self.listing = extractor,
            TargetKind::SiteContact => self.contact = extractor,
        }
        self
    }

    pub async fn run(&self, targets: &[Target]) -> HarvestReport {
        self.run_with_cancel(targets, CancellationToken::new()).await
    }

    /// Once `cancel` fires, in-flight and pending targets are recorded as
    /// cancelled. The fetcher is shut down exactly once, after the last
    /// target has resolved.
    pub async fn run_with_cancel(&self, targets: &[Target], cancel: CancellationToken) -> HarvestReport {
        engine_info!(
            "Harvesting {} targets with concurrency {}",
            targets.len(),
            self.concurrency
        );
        let mut builder = ReportBuilder::new(targets.iter().map(|t| t.id).collect());

        let deadline_task = self.deadline.map(|deadline| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                engine_warn!("Deadline of {:?} reached, cancelling remaining targets", deadline);
                token.cancel();
            })
        });

        let mut completed = std::pin::pin!(stream::iter(targets.iter().enumerate())
            .map(|(index, target)| {
                let cancel = &cancel;
                async move { (index, self.process(target, cancel).await) }
            })
            .buffer_unordered(self.concurrency));

        while let Some((index, record)) = completed.next().await {
            if !builder.insert(index, record) {
                engine_warn!("Duplicate record for target at position {} ignored", index);
            }
        }

        if let Some(task) = deadline_task {
            task.abort();
        }
        self.fetcher.shutdown().await;

        let report = builder.finish();
        engine_info!("Harvest finished: {}", report);
        report
    }

    fn plan(&self, kind: TargetKind) -> KindPlan {
        match kind {
            TargetKind::ListingQuery => self.listing_plan,
            TargetKind::SiteContact => self.contact_plan,
        }
    }

    fn extractor(&self, kind: TargetKind) -> &dyn Extractor {
        match kind {
            TargetKind::ListingQuery => self.listing.as_ref(),
            TargetKind::SiteContact => self.contact.as_ref(),
        }
    }

    async fn process(&self, target: &Target, cancel: &CancellationToken) -> ExtractedRecord {
        if let Some(defect) = &target.defect {
            engine_warn!("Target {} failed: {} ({})", target.id, FailureKind::MalformedInput, defect);
            return ExtractedRecord::failed(target.id, FailureKind::MalformedInput);
        }
        let Some(url) = target.primary_url.as_deref() else {
            engine_debug!("Target {} has no value, skipping fetch", target.id);
            return ExtractedRecord::not_found(target.id);
        };
        if cancel.is_cancelled() {
            return ExtractedRecord::failed(target.id, FailureKind::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                engine_warn!("Target {} failed: {}", target.id, FailureKind::Cancelled);
                ExtractedRecord::failed(target.id, FailureKind::Cancelled)
            }
            record = self.drive(target, url) => record,
        }
    }

    /// Runs the per-target state machine to a terminal state.
    async fn drive(&self, target: &Target, url: &str) -> ExtractedRecord {
        let plan = self.plan(target.kind);
        let max_retries = plan.retry.max_retries;
        let ctx = ExtractContext {
            fetcher: self.fetcher.as_ref(),
            navigation: plan.navigation,
            timeout: self.timeout,
        };

        let mut state = TargetState::Pending;
        let mut retries = 0;
        let mut fields = Vec::new();

        loop {
            if let Some(current) = state.retries() {
                retries = current;
            }
            state = match state {
                TargetState::Pending => advance(state, TargetEvent::SlotAcquired, max_retries),
                TargetState::Fetching { .. } => {
                    engine_debug!("Target {} fetching {} (retries so far: {})", target.id, url, retries);
                    let event = match self.fetcher.fetch(url, plan.navigation, self.timeout).await {
                        Ok(page) => TargetEvent::FetchSucceeded(page),
                        Err(err) => {
                            engine_debug!("Target {} fetch attempt failed: {}", target.id, err);
                            TargetEvent::FetchFailed(err.kind)
                        }
                    };
                    advance(state, event, max_retries)
                }
                TargetState::Retry { retries: retry } => {
                    let delay = plan.retry.backoff.delay(retry);
                    engine_info!("Target {} retry {} in {:?}", target.id, retry, delay);
                    tokio::time::sleep(delay).await;
                    advance(state, TargetEvent::BackoffElapsed, max_retries)
                }
                TargetState::Extracting { ref page, .. } => {
                    let event = match self.extractor(target.kind).extract(page, &ctx).await {
                        Ok(Extraction::Found(found)) => {
                            fields = found;
                            TargetEvent::Extracted { found: true }
                        }
                        Ok(Extraction::NotFound) => TargetEvent::Extracted { found: false },
                        Err(err) => TargetEvent::ExtractionFailed(err.kind()),
                    };
                    advance(state, event, max_retries)
                }
                TargetState::Done { found: true } => {
                    return ExtractedRecord::found(target.id, fields).with_retries(retries);
                }
                TargetState::Done { found: false } => {
                    return ExtractedRecord::not_found(target.id).with_retries(retries);
                }
                TargetState::Failed(kind) => {
                    engine_warn!("Target {} failed: {}", target.id, kind);
                    return ExtractedRecord::failed(target.id, kind).with_retries(retries);
                }
            };
        }
    }
}
