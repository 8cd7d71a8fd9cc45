use crate::services::providers::{MetadataProvider, Recommender};

/// Where a batch of recommendations came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationSource {
    LanguageModel,
    Metadata,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendations {
    pub titles: Vec<String>,
    pub source: RecommendationSource,
}

/// Drops anything from the first `(` on, e.g. a year or an annotation
fn clean(title: &str) -> Option<String> {
    let cleaned = title.split('(').next().unwrap_or_default().trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Service function for recommendation generation
///
/// Asks the language model first. When it is not configured, fails, or
/// returns nothing usable, falls back to the metadata service's similar
/// titles. Failures on either side are logged, never propagated.
pub async fn get_recommendations(
    recommender: Option<&dyn Recommender>,
    metadata: &dyn MetadataProvider,
    seed: &str,
    model_limit: usize,
    fallback_limit: usize,
) -> Recommendations {
    if let Some(recommender) = recommender {
        match recommender.recommend(seed, model_limit).await {
            Ok(titles) => {
                let titles: Vec<String> = titles.iter().filter_map(|t| clean(t)).collect();
                if !titles.is_empty() {
                    tracing::info!(
                        provider = recommender.name(),
                        count = titles.len(),
                        "Using language model recommendations"
                    );
                    return Recommendations {
                        titles,
                        source: RecommendationSource::LanguageModel,
                    };
                }
                tracing::warn!(provider = recommender.name(), "Language model returned no titles");
            }
            Err(e) => {
                tracing::warn!(provider = recommender.name(), error = %e, "Language model recommendations failed");
            }
        }
    } else {
        tracing::info!("No language model configured");
    }

    tracing::warn!(provider = metadata.name(), "Falling back to metadata recommendations");
    match metadata.similar_titles(seed, fallback_limit).await {
        Ok(titles) => {
            let titles: Vec<String> = titles.iter().filter_map(|t| clean(t)).collect();
            tracing::info!(provider = metadata.name(), count = titles.len(), "Using metadata recommendations");
            let source = if titles.is_empty() {
                RecommendationSource::None
            } else {
                RecommendationSource::Metadata
            };
            Recommendations { titles, source }
        }
        Err(e) => {
            tracing::error!(provider = metadata.name(), error = %e, "Metadata recommendations failed");
            Recommendations {
                titles: Vec::new(),
                source: RecommendationSource::None,
            }
        }
    }
}
