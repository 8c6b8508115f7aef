use std::sync::Arc;

use song_core::generation::TextGenerator;
use song_core::skill::SkillRegistry;
use song_providers::CitationRetriever;

use crate::skills::{ComposeSkill, FixSkill, LyricsSkill, PlanSkill, ProducerSkill, ReviewSkill, StyleSkill, ValidateSkill};

/// All eight stages. LYRICS and FIX share `generator`; LYRICS retrieves
/// citations through `retriever` when given.
pub fn default_skills(generator: Arc<dyn TextGenerator>, retriever: Option<Arc<CitationRetriever>>) -> SkillRegistry {
    let mut lyrics = LyricsSkill::new(generator.clone());
    if let Some(retriever) = retriever {
        lyrics = lyrics.with_retriever(retriever);
    }
    SkillRegistry::new().with(Arc::new(PlanSkill))
                        .with(Arc::new(StyleSkill))
                        .with(Arc::new(lyrics))
                        .with(Arc::new(ProducerSkill))
                        .with(Arc::new(ComposeSkill))
                        .with(Arc::new(ValidateSkill))
                        .with(Arc::new(FixSkill::new(generator)))
                        .with(Arc::new(ReviewSkill))
}

#[cfg(test)]
mod tests {
    use super::*;
    use song_core::generation::SeededMockGenerator;

    #[test]
    fn covers_the_whole_pipeline() {
        let registry = default_skills(Arc::new(SeededMockGenerator::new()), None);
        assert!(registry.verify().is_ok());
    }
}
