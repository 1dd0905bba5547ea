pub mod cancel;
pub mod direction;
pub mod history;
pub mod objective;
pub mod step;
pub mod stopping;
pub mod trainer;

pub use cancel::CancellationFlag;
pub use direction::{
    ConjugateGradientFormula, DirectionState, QuasiNewtonFormula, TrainingDirection,
};
pub use history::{
    Convergence, ConvergenceWarning, IterationRecord, TerminationReason, TrainingHistory,
};
pub use objective::Objective;
pub use step::StepSize;
pub use stopping::{IterationState, StoppingCriteria};
pub use trainer::{Trainer, TrainingConfig, TrainingResult};
