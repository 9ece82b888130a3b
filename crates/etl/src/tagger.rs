//! 风险与情感标注

use crate::risk::RiskClassifier;
use crate::sentiment::{score_post, SentimentScorer, VaderScorer};
use crate::types::{CleanedPost, ScoredPost};

/// 标注器：情感打分 + 风险分类
pub struct Tagger {
    scorer: Box<dyn SentimentScorer>,
    classifier: RiskClassifier,
}

impl Tagger {
    pub fn new(scorer: Box<dyn SentimentScorer>, classifier: RiskClassifier) -> Self {
        Self { scorer, classifier }
    }

    pub fn scorer_name(&self) -> &str {
        self.scorer.name()
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    /// 标注单条帖子
    pub fn tag(&self, cleaned: &CleanedPost) -> ScoredPost {
        let sentiment = score_post(self.scorer.as_ref(), cleaned);
        let rule = self.classifier.first_match(&cleaned.cleaned_text);

        ScoredPost {
            cleaned: cleaned.clone(),
            sentiment,
            risk_level: rule.map(|r| r.level).unwrap_or_default(),
            matched_rule: rule.map(|r| r.label.clone()),
        }
    }

    /// 批量标注，保持输入顺序
    pub fn tag_batch(&self, posts: &[CleanedPost]) -> Vec<ScoredPost> {
        posts.iter().map(|post| self.tag(post)).collect()
    }
}

impl Default for Tagger {
    fn default() -> Self {
        Self::new(Box::new(VaderScorer::new()), RiskClassifier::new())
    }
}
