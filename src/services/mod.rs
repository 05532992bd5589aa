//! External collaborator seams: classification backend and decision logging

pub mod classifier;
pub mod decision_log;

pub use classifier::{Classifier, ClassifierError, ClassifierRequest, HttpClassifier};
pub use decision_log::{
    DecisionLogger, MemoryDecisionLogger, NoopDecisionLogger, RoutingDecisionRecord,
};
