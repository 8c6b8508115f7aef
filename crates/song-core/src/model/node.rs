//! Closed set of pipeline nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One named pipeline stage. The discriminant order is the node index used
/// for seed derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeName {
    Plan,
    Style,
    Lyrics,
    Producer,
    Compose,
    Validate,
    Fix,
    Review,
}

impl NodeName {
    /// Every node, in pipeline order.
    pub const PIPELINE: [NodeName; 8] = [NodeName::Plan,
                                         NodeName::Style,
                                         NodeName::Lyrics,
                                         NodeName::Producer,
                                         NodeName::Compose,
                                         NodeName::Validate,
                                         NodeName::Fix,
                                         NodeName::Review];

    /// Position of the node in `PIPELINE`.
    pub const fn index(self) -> u64 {
        match self {
            NodeName::Plan => 0,
            NodeName::Style => 1,
            NodeName::Lyrics => 2,
            NodeName::Producer => 3,
            NodeName::Compose => 4,
            NodeName::Validate => 5,
            NodeName::Fix => 6,
            NodeName::Review => 7,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            NodeName::Plan => "PLAN",
            NodeName::Style => "STYLE",
            NodeName::Lyrics => "LYRICS",
            NodeName::Producer => "PRODUCER",
            NodeName::Compose => "COMPOSE",
            NodeName::Validate => "VALIDATE",
            NodeName::Fix => "FIX",
            NodeName::Review => "REVIEW",
        }
    }

    /// Key under which a node output is stored on the run. Loop iterations
    /// get a suffix so earlier outputs are never overwritten.
    pub fn output_key(self, iteration: u32) -> String {
        if iteration == 0 {
            self.as_str().to_string()
        } else {
            format!("{}_{}", self.as_str(), iteration)
        }
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_order_matches_index() {
        for (i, node) in NodeName::PIPELINE.iter().enumerate() {
            assert_eq!(node.index(), i as u64);
        }
    }

    #[test]
    fn output_keys() {
        assert_eq!(NodeName::Validate.output_key(0), "VALIDATE");
        assert_eq!(NodeName::Validate.output_key(2), "VALIDATE_2");
    }

    #[test]
    fn serializes_uppercase() {
        assert_eq!(serde_json::to_string(&NodeName::Producer).unwrap(), "\"PRODUCER\"");
    }
}
