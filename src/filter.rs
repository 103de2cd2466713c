//! Relevance filtering through an external classifier.
//!
//! The same two-step shape runs twice per pipeline run: once over titles
//! right after collection, once over extracted bodies. Each invocation makes
//! a single classifier call (retried and time-boxed). Whatever the classifier
//! returns is checked against the ids that were actually sent; when nothing
//! usable comes back the filter keeps the first few inputs instead, so a
//! classifier outage degrades the run instead of emptying it.

use crate::error::ClassifierError;
use crate::extractor::noise::{NoiseStripper, NormalizeOptions};
use crate::models::{Candidate, EnrichedCandidate};
use crate::retry::{RetryPolicy, with_retry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Which pass of the filter is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterStage {
    /// Judge by headline alone.
    Title,
    /// Judge by headline plus a cleaned excerpt of the body.
    Content,
}

/// One indexed item sent to the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterItem {
    pub id: usize,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterRequest {
    pub stage: FilterStage,
    /// How many items the caller would like back.
    pub keep: usize,
    pub items: Vec<FilterItem>,
}

/// One entry of the classifier's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectedItem {
    pub id: usize,
    pub title: String,
}

/// The classifier's answer: selected items, most relevant first.
pub type FilterResponse = Vec<SelectedItem>;

/// Picks the relevant items out of a [`FilterRequest`].
#[async_trait]
pub trait RelevanceClassifier: Send + Sync {
    async fn classify(&self, request: &FilterRequest) -> Result<FilterResponse, ClassifierError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    /// Items kept after the title pass, and the fallback prefix length.
    pub title_keep: usize,
    /// Items kept after the content pass, and the fallback prefix length.
    pub content_keep: usize,
    /// Per-attempt limit on a classifier call.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    /// How bodies are cleaned and shortened before being sent.
    pub excerpt: NormalizeOptions,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            title_keep: 15,
            content_keep: 5,
            call_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            excerpt: NormalizeOptions::default(),
        }
    }
}

/// Keep only selections that name an id we sent, once each, in the
/// classifier's order, capped at `keep`.
pub fn valid_selection(response: &[SelectedItem], sent: usize, keep: usize) -> Vec<usize> {
    let mut seen = HashSet::new();
    response
        .iter()
        .map(|s| s.id)
        .filter(|&id| id < sent && seen.insert(id))
        .take(keep)
        .collect()
}

pub struct RelevanceFilter {
    classifier: Arc<dyn RelevanceClassifier>,
    options: FilterOptions,
    stripper: NoiseStripper,
}

impl RelevanceFilter {
    pub fn new(classifier: Arc<dyn RelevanceClassifier>, options: FilterOptions) -> Self {
        let stripper = NoiseStripper::new(options.excerpt.clone());
        Self {
            classifier,
            options,
            stripper,
        }
    }

    pub fn with_stripper(
        classifier: Arc<dyn RelevanceClassifier>,
        options: FilterOptions,
        stripper: NoiseStripper,
    ) -> Self {
        Self {
            classifier,
            options,
            stripper,
        }
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// Title pass over freshly collected candidates.
    pub async fn filter_titles(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let items = candidates
            .iter()
            .enumerate()
            .map(|(id, c)| FilterItem {
                id,
                title: c.title.clone(),
                body: None,
            })
            .collect();
        self.select(FilterStage::Title, candidates, items, self.options.title_keep)
            .await
    }

    /// Content pass over enriched candidates. Each item carries the
    /// noise-stripped body as its excerpt.
    pub async fn filter_contents(&self, enriched: Vec<EnrichedCandidate>) -> Vec<EnrichedCandidate> {
        let items = enriched
            .iter()
            .enumerate()
            .map(|(id, e)| FilterItem {
                id,
                title: e.candidate.title.clone(),
                body: e.body_text.as_deref().map(|b| self.stripper.clean(b)),
            })
            .collect();
        self.select(FilterStage::Content, enriched, items, self.options.content_keep)
            .await
    }

    #[instrument(level = "info", skip_all, fields(stage = ?stage, inputs = inputs.len(), keep = keep))]
    async fn select<T>(&self, stage: FilterStage, inputs: Vec<T>, items: Vec<FilterItem>, keep: usize) -> Vec<T> {
        if inputs.is_empty() {
            debug!("Nothing to filter");
            return inputs;
        }

        let t0 = Instant::now();
        let request = FilterRequest { stage, keep, items };
        let call_timeout = self.options.call_timeout;
        let label = match stage {
            FilterStage::Title => "classify titles",
            FilterStage::Content => "classify contents",
        };

        let request = &request;
        let classifier = &self.classifier;
        let outcome = with_retry(&self.options.retry, label, || async move {
            match timeout(call_timeout, classifier.classify(request)).await {
                Ok(res) => res,
                Err(_) => Err(ClassifierError::Timeout(call_timeout)),
            }
        })
        .await;

        let selected = match &outcome {
            Ok(response) => valid_selection(response, inputs.len(), keep),
            Err(_) => Vec::new(),
        };

        if selected.is_empty() {
            let reason = match outcome {
                Ok(response) => format!("no usable ids among {} returned", response.len()),
                Err(e) => e.to_string(),
            };
            warn!(
                reason = %reason,
                fallback = keep.min(inputs.len()),
                "Classifier result unusable; keeping leading items"
            );
            return inputs.into_iter().take(keep).collect();
        }

        let mut slots: Vec<Option<T>> = inputs.into_iter().map(Some).collect();
        let kept: Vec<T> = selected.iter().filter_map(|&id| slots[id].take()).collect();
        info!(
            kept = kept.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Relevance filter done"
        );
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays scripted answers and records what it was asked.
    #[derive(Default)]
    struct ScriptedClassifier {
        answers: Mutex<Vec<Result<FilterResponse, ClassifierError>>>,
        calls: AtomicUsize,
        requests: Mutex<Vec<FilterRequest>>,
        delay: Option<Duration>,
    }

    impl ScriptedClassifier {
        fn answering(answers: Vec<Result<FilterResponse, ClassifierError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().rev().collect()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl RelevanceClassifier for ScriptedClassifier {
        async fn classify(&self, request: &FilterRequest) -> Result<FilterResponse, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ClassifierError::Schema("no scripted answer".into())))
        }
    }

    fn candidates(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| {
                Candidate::new(
                    &format!("기사 {i}"),
                    "요약",
                    &format!("https://news.example/{i}"),
                    Utc::now(),
                    "Test Wire",
                    None,
                )
                .unwrap()
            })
            .collect()
    }

    fn pick(ids: &[usize]) -> FilterResponse {
        ids.iter()
            .map(|&id| SelectedItem {
                id,
                title: format!("기사 {id}"),
            })
            .collect()
    }

    fn options() -> FilterOptions {
        FilterOptions {
            retry: RetryPolicy {
                base_delay: Duration::ZERO,
                ..RetryPolicy::default()
            },
            ..FilterOptions::default()
        }
    }

    fn titles(cs: &[Candidate]) -> Vec<&str> {
        cs.iter().map(|c| c.title.as_str()).collect()
    }

    #[tokio::test]
    async fn keeps_classifier_order() {
        let classifier = Arc::new(ScriptedClassifier::answering(vec![Ok(pick(&[3, 0, 2]))]));
        let filter = RelevanceFilter::new(classifier.clone(), options());

        let kept = filter.filter_titles(candidates(5)).await;
        assert_eq!(titles(&kept), ["기사 3", "기사 0", "기사 2"]);

        let requests = classifier.requests.lock().unwrap();
        let sent = &requests[0];
        assert_eq!(sent.stage, FilterStage::Title);
        assert_eq!(sent.keep, 15);
        assert_eq!(sent.items.len(), 5);
        assert_eq!(sent.items[4].title, "기사 4");
        assert_eq!(sent.items[4].body, None);
    }

    #[tokio::test]
    async fn content_request_carries_the_cleaned_body() {
        let classifier = Arc::new(ScriptedClassifier::answering(vec![Ok(pick(&[0]))]));
        let filter = RelevanceFilter::new(classifier.clone(), options());

        let mut items = candidates(2).into_iter();
        let with_body = EnrichedCandidate {
            body_text: Some(
                "[광고] 프리미엄 회원 구독하세요\n한국은행이 기준금리를 동결했다. 시장은 예상된 결과라는 반응이다."
                    .into(),
            ),
            ..EnrichedCandidate::unenriched(items.next().unwrap())
        };
        let without_body = EnrichedCandidate::unenriched(items.next().unwrap());

        let kept = filter.filter_contents(vec![with_body, without_body]).await;
        assert_eq!(kept.len(), 1);

        let requests = classifier.requests.lock().unwrap();
        let sent = &requests[0];
        assert_eq!(sent.stage, FilterStage::Content);
        assert_eq!(
            sent.items[0].body.as_deref(),
            Some("한국은행이 기준금리를 동결했다. 시장은 예상된 결과라는 반응이다.")
        );
        assert_eq!(sent.items[1].body, None);
    }

    #[tokio::test]
    async fn content_stage_failure_falls_back_to_first_five() {
        let classifier = Arc::new(ScriptedClassifier::answering(vec![]));
        let filter = RelevanceFilter::new(classifier.clone(), options());

        let enriched: Vec<_> = candidates(10)
            .into_iter()
            .map(|c| EnrichedCandidate {
                body_text: Some("본문 내용이 충분히 길게 이어지는 기사입니다.".repeat(5)),
                ..EnrichedCandidate::unenriched(c)
            })
            .collect();
        let kept = filter.filter_contents(enriched).await;

        let kept_titles: Vec<_> = kept.iter().map(|e| e.candidate.title.as_str()).collect();
        assert_eq!(kept_titles, ["기사 0", "기사 1", "기사 2", "기사 3", "기사 4"]);
        // first attempt plus two retries
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fallback_with_fewer_items_than_keep_returns_all() {
        let classifier = Arc::new(ScriptedClassifier::answering(vec![
            Err(ClassifierError::Truncated),
            Err(ClassifierError::Truncated),
            Err(ClassifierError::Truncated),
        ]));
        let filter = RelevanceFilter::new(
            classifier,
            FilterOptions {
                title_keep: 5,
                ..options()
            },
        );
        let kept = filter.filter_titles(candidates(2)).await;
        assert_eq!(titles(&kept), ["기사 0", "기사 1"]);
    }

    #[tokio::test]
    async fn empty_input_skips_the_classifier() {
        let classifier = Arc::new(ScriptedClassifier::default());
        let filter = RelevanceFilter::new(classifier.clone(), options());
        assert!(filter.filter_titles(Vec::new()).await.is_empty());
        assert!(filter.filter_contents(Vec::new()).await.is_empty());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn out_of_range_and_repeated_ids_are_dropped() {
        let classifier = Arc::new(ScriptedClassifier::answering(vec![Ok(pick(&[7, 1, 1, 42, 0]))]));
        let filter = RelevanceFilter::new(classifier, options());
        let kept = filter.filter_titles(candidates(8)).await;
        assert_eq!(titles(&kept), ["기사 7", "기사 1", "기사 0"]);
    }

    #[tokio::test]
    async fn only_invalid_ids_fall_back() {
        let classifier = Arc::new(ScriptedClassifier::answering(vec![Ok(pick(&[99, 100]))]));
        let filter = RelevanceFilter::new(
            classifier.clone(),
            FilterOptions {
                title_keep: 3,
                ..options()
            },
        );
        let kept = filter.filter_titles(candidates(6)).await;
        assert_eq!(titles(&kept), ["기사 0", "기사 1", "기사 2"]);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_recovers_after_a_failure() {
        let classifier = Arc::new(ScriptedClassifier::answering(vec![
            Err(ClassifierError::Schema("not an array".into())),
            Ok(pick(&[2])),
        ]));
        let filter = RelevanceFilter::new(classifier.clone(), options());
        let kept = filter.filter_titles(candidates(3)).await;
        assert_eq!(titles(&kept), ["기사 2"]);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_classifier_times_out_into_fallback() {
        let classifier = Arc::new(ScriptedClassifier {
            delay: Some(Duration::from_secs(120)),
            answers: Mutex::new(vec![Ok(pick(&[1]))]),
            ..ScriptedClassifier::default()
        });
        let filter = RelevanceFilter::new(
            classifier,
            FilterOptions {
                title_keep: 2,
                retry: RetryPolicy::none(),
                ..options()
            },
        );
        let kept = filter.filter_titles(candidates(4)).await;
        assert_eq!(titles(&kept), ["기사 0", "기사 1"]);
    }

    #[test]
    fn selection_is_capped_at_keep() {
        assert_eq!(valid_selection(&pick(&[4, 3, 2, 1]), 5, 2), [4, 3]);
    }

    #[test]
    fn selected_item_rejects_unknown_fields() {
        let ok: SelectedItem = serde_json::from_str(r#"{"id": 1, "title": "t"}"#).unwrap();
        assert_eq!(ok.id, 1);
        assert!(serde_json::from_str::<SelectedItem>(r#"{"id": 1, "title": "t", "score": 3}"#).is_err());
        assert!(serde_json::from_str::<SelectedItem>(r#"{"id": "1", "title": "t"}"#).is_err());
    }
}
