use std::fmt;

/// Position of a `customize()` call in its state machine, used in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Unpacking,
    Customizing,
    Packing { index: usize, total: usize },
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => write!(f, "idle"),
            Stage::Unpacking => write!(f, "unpacking"),
            Stage::Customizing => write!(f, "customizing"),
            Stage::Packing { index, total } => write!(f, "packing {index}/{total}"),
            Stage::Done => write!(f, "done"),
            Stage::Failed => write!(f, "failed"),
        }
    }
}
