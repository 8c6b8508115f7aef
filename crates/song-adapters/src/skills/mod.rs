mod compose;
mod fix;
mod lyrics;
mod plan;
mod producer;
mod review;
mod style;
mod validate;

pub use compose::{ComposeSkill, DEFAULT_PROMPT_CHAR_LIMIT};
pub use fix::FixSkill;
pub use lyrics::{LyricsSkill, DEFAULT_TOP_K};
pub use plan::{PlanSkill, DEFAULT_SECTION_ORDER};
pub use producer::ProducerSkill;
pub use review::ReviewSkill;
pub use style::StyleSkill;
pub use validate::ValidateSkill;
