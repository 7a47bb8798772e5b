use async_trait::async_trait;

use crate::classifier::classify;
use crate::config::TopicConfig;
use crate::dispatch::{Outcome, Stage};
use crate::job::Job;

/// Dispatch stage that forwards each job to its light or heavy topic.
#[derive(Debug, Clone)]
pub struct ClassifierStage {
    topics: TopicConfig,
}

impl ClassifierStage {
    pub fn new(topics: TopicConfig) -> Self {
        Self { topics }
    }
}

#[async_trait]
impl Stage for ClassifierStage {
    fn name(&self) -> &str {
        "classifier"
    }

    async fn process(&mut self, job: &Job) -> Outcome {
        let route = classify(&job.attributes());
        Outcome::Classified {
            route,
            out_topic: self.topics.topic_for(route).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Route;
    use crate::job::JobAttributes;

    #[tokio::test]
    async fn forwards_to_route_topic() {
        let mut stage = ClassifierStage::new(TopicConfig::default());

        let light = Job::new(JobAttributes::new(10, 5, 2));
        let heavy = Job::new(JobAttributes::new(10, 200, 2));

        assert_eq!(
            stage.process(&light).await,
            Outcome::Classified {
                route: Route::Light,
                out_topic: "jobs.light".to_string(),
            }
        );
        let outcome = stage.process(&heavy).await;
        assert_eq!(outcome.destination(), Some("jobs.heavy"));
    }
}
