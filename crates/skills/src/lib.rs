pub mod classification;
pub mod discover;
pub mod learn;
pub mod toolkit;

pub use classification::ClassificationSkill;
pub use discover::DiscoverLabelsSkill;
pub use learn::SkillLearner;
