use std::collections::BTreeMap;
use std::sync::Arc;

use super::StageSkill;
use crate::errors::EngineError;
use crate::model::NodeName;

/// Explicit mapping from node to the skill implementing it.
#[derive(Debug, Clone, Default)]
pub struct SkillRegistry {
    skills: BTreeMap<NodeName, Arc<dyn StageSkill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `skill` under the node it declares, replacing any previous one.
    pub fn with(mut self, skill: Arc<dyn StageSkill>) -> Self {
        self.insert(skill.node(), skill);
        self
    }

    pub fn insert(&mut self, node: NodeName, skill: Arc<dyn StageSkill>) -> Option<Arc<dyn StageSkill>> {
        self.skills.insert(node, skill)
    }

    pub fn get(&self, node: NodeName) -> Option<&Arc<dyn StageSkill>> {
        self.skills.get(&node)
    }

    /// Checks that every pipeline node has a skill declaring that node.
    pub fn verify(&self) -> Result<(), EngineError> {
        for node in NodeName::PIPELINE {
            let skill = self.skills.get(&node).ok_or(EngineError::MissingSkill(node))?;
            if skill.node() != node {
                return Err(EngineError::MisregisteredSkill { skill: skill.name().to_string(),
                                                             registered: node,
                                                             declared: skill.node() });
            }
        }
        Ok(())
    }
}
