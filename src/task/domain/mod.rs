//! Domain model for the article generation task queue.
//!
//! Tasks, profiles, word supplies and articles are plain values here; the
//! conditional writes that make claiming safe live behind the repository
//! ports.

mod article;
mod error;
mod ids;
mod payload;
mod profile;
mod task;
mod vocabulary;

pub use article::{Article, ArticleDraft, ArticleStatus, PersistedArticleData};
pub use error::{
    ParseArticleStatusError, ParseTaskStatusError, ParseTaskTypeError, ParseTriggerSourceError,
    TaskDomainError,
};
pub use ids::{ArticleId, BusinessDate, ProfileId, TaskId, TaskVersion};
pub use payload::{GenerationCheckpoint, TaskPayload, TaskResultSummary};
pub use profile::{Profile, ProfileName};
pub use task::{PersistedTaskData, Task, TaskStatus, TaskType, TriggerSource};
pub use vocabulary::DailyWordSupply;
