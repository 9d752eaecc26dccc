/// Configuration for grammar analysis
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalysisConfig {
    /// Maximum number of states in one decision automaton before the
    /// decision is reported as non-convergent
    pub max_states: usize,

    /// How many times the same call site may appear on a configuration's
    /// call stack before the decision is rejected as needing unbounded
    /// recursion
    pub max_recursion_depth: usize,

    /// Build independent decisions on the rayon pool (needs the `parallel`
    /// feature; ignored otherwise)
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_states: 4096,
            max_recursion_depth: 4,
            parallel: cfg!(feature = "parallel"),
        }
    }
}

impl AnalysisConfig {
    #[must_use]
    pub const fn with_max_states(mut self, max_states: usize) -> Self {
        self.max_states = max_states;
        self
    }

    #[must_use]
    pub const fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
