use super::{DestinationId, PublishResult, Publisher, SummaryPublisher, UrlMap};
use crate::alert::Alert;
use crate::article::ArticleDocument;
use futures::future::join_all;
use std::sync::Arc;

/// Results of one dispatch, in destination order with the summary last.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub results: Vec<PublishResult>,
    pub urls: UrlMap,
}

impl DispatchOutcome {
    pub fn failures(&self) -> impl Iterator<Item = &PublishResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

/// Fans an article out to every enabled destination.
///
/// Destinations run concurrently and independently: a failure is logged,
/// alerted, and recorded in the outcome, and never stops the others. The
/// summary destination (if any) runs after all of them with the collected
/// URLs.
pub struct Dispatcher {
    publishers: Vec<Arc<dyn Publisher>>,
    summary: Option<Arc<dyn SummaryPublisher>>,
    alert: Arc<dyn Alert>,
}

impl Dispatcher {
    pub fn new(
        publishers: Vec<Arc<dyn Publisher>>,
        summary: Option<Arc<dyn SummaryPublisher>>,
        alert: Arc<dyn Alert>,
    ) -> Self {
        Self {
            publishers,
            summary,
            alert,
        }
    }

    pub fn destinations(&self) -> Vec<DestinationId> {
        self.publishers
            .iter()
            .map(|p| p.id())
            .chain(self.summary.iter().map(|s| s.id()))
            .collect()
    }

    pub async fn dispatch(&self, article: &ArticleDocument) -> DispatchOutcome {
        let attempts = self.publishers.iter().map(|publisher| async move {
            let id = publisher.id();
            tracing::info!(destination = %id, "Publishing");
            match publisher.publish(article).await {
                Ok(url) => PublishResult {
                    destination: id,
                    url,
                    error: None,
                },
                Err(e) => {
                    tracing::error!(destination = %id, error = %e, "Publishing failed");
                    self.alert.send_alert(&format!("publish to {id}"), &e).await;
                    PublishResult {
                        destination: id,
                        url: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        });

        let mut outcome = DispatchOutcome {
            results: join_all(attempts).await,
            urls: UrlMap::new(),
        };
        for result in &outcome.results {
            if let Some(url) = &result.url {
                outcome.urls.insert(result.destination, url.clone());
            }
        }

        if let Some(summary) = &self.summary {
            let id = summary.id();
            tracing::info!(destination = %id, urls = outcome.urls.len(), "Publishing summary");
            let error = match summary.publish_summary(article, &outcome.urls).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::error!(destination = %id, error = %e, "Summary publishing failed");
                    self.alert.send_alert(&format!("publish to {id}"), &e).await;
                    Some(e.to_string())
                }
            };
            outcome.results.push(PublishResult {
                destination: id,
                url: None,
                error,
            });
        }

        tracing::info!(
            destinations = outcome.results.len(),
            failed = outcome.failures().count(),
            "Dispatch complete"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::test_support::article;
    use crate::publish::PublishError;
    use async_trait::async_trait;
    use std::error::Error;
    use std::sync::Mutex;

    struct Fixed {
        id: DestinationId,
        url: Option<&'static str>,
        fail: bool,
        calls: Arc<Mutex<Vec<DestinationId>>>,
    }

    #[async_trait]
    impl Publisher for Fixed {
        fn id(&self) -> DestinationId {
            self.id
        }

        async fn publish(&self, _article: &ArticleDocument) -> Result<Option<String>, PublishError> {
            self.calls.lock().unwrap().push(self.id);
            if self.fail {
                return Err(PublishError::Api("rejected".to_string()));
            }
            Ok(self.url.map(String::from))
        }
    }

    struct RecordingSummary {
        seen: Arc<Mutex<Option<UrlMap>>>,
    }

    #[async_trait]
    impl SummaryPublisher for RecordingSummary {
        fn id(&self) -> DestinationId {
            DestinationId::Wecom
        }

        async fn publish_summary(
            &self,
            _article: &ArticleDocument,
            urls: &UrlMap,
        ) -> Result<(), PublishError> {
            *self.seen.lock().unwrap() = Some(urls.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingAlert {
        contexts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Alert for RecordingAlert {
        async fn send_alert(&self, context: &str, _error: &(dyn Error + Send + Sync)) {
            self.contexts.lock().unwrap().push(context.to_string());
        }
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let make = |id, url, fail| -> Arc<dyn Publisher> {
            Arc::new(Fixed {
                id,
                url,
                fail,
                calls: Arc::clone(&calls),
            })
        };
        let seen = Arc::new(Mutex::new(None));
        let alert = Arc::new(RecordingAlert::default());

        let dispatcher = Dispatcher::new(
            vec![
                make(DestinationId::Devto, Some("https://dev.to/a"), true),
                make(DestinationId::Juejin, Some("https://juejin.cn/post/1"), false),
                make(DestinationId::Csdn, Some("https://blog.csdn.net/x"), false),
            ],
            Some(Arc::new(RecordingSummary {
                seen: Arc::clone(&seen),
            })),
            alert.clone(),
        );

        let outcome = dispatcher.dispatch(&article()).await;

        assert_eq!(calls.lock().unwrap().len(), 3);
        assert!(!outcome.urls.contains_key(&DestinationId::Devto));
        assert_eq!(outcome.urls[&DestinationId::Juejin], "https://juejin.cn/post/1");
        assert_eq!(outcome.urls[&DestinationId::Csdn], "https://blog.csdn.net/x");

        let failed: Vec<_> = outcome.failures().map(|r| r.destination).collect();
        assert_eq!(failed, vec![DestinationId::Devto]);
        assert_eq!(*alert.contexts.lock().unwrap(), vec!["publish to devto".to_string()]);

        // Summary ran last and saw only the successful URLs
        assert_eq!(outcome.results.last().unwrap().destination, DestinationId::Wecom);
        assert_eq!(seen.lock().unwrap().as_ref(), Some(&outcome.urls));
    }

    #[tokio::test]
    async fn test_results_keep_destination_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let publishers: Vec<Arc<dyn Publisher>> = [DestinationId::Yuque, DestinationId::LocalFile]
            .into_iter()
            .map(|id| {
                Arc::new(Fixed {
                    id,
                    url: None,
                    fail: false,
                    calls: Arc::clone(&calls),
                }) as Arc<dyn Publisher>
            })
            .collect();

        let dispatcher = Dispatcher::new(publishers, None, Arc::new(RecordingAlert::default()));
        assert_eq!(
            dispatcher.destinations(),
            vec![DestinationId::Yuque, DestinationId::LocalFile]
        );

        let outcome = dispatcher.dispatch(&article()).await;
        let order: Vec<_> = outcome.results.iter().map(|r| r.destination).collect();
        assert_eq!(order, vec![DestinationId::Yuque, DestinationId::LocalFile]);
        assert!(outcome.urls.is_empty());
        assert_eq!(outcome.failures().count(), 0);
    }
}
