mod ids;
mod progress;
mod question;
mod quiz;
mod section;

pub use ids::{IdError, QuestionId, QuizType, ScopeId, SectionId, UserId};
pub use progress::{
    SectionProgress, all_required_completed, completion_percentage, next_incomplete,
};
pub use question::Question;
pub use quiz::{Answer, QuizOutcome};
pub use section::{ReadingSection, Section, SectionRegistry};
