//! Utility types for the container

/// Dependency resolution utilities
pub mod dependency {
    use crate::error::{ContainerError, ContainerResult};

    /// Tracks the identifiers being resolved on the current call chain.
    ///
    /// Each recursive resolution receives its own extended copy, so sibling
    /// dependencies never see each other and only a true cycle is reported.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct LoopTracker {
        chain: Vec<String>,
    }

    impl LoopTracker {
        /// Creates an empty tracker.
        pub fn new() -> Self {
            Self::default()
        }

        /// Returns a tracker extended with `id`.
        ///
        /// # Errors
        ///
        /// Returns [`ContainerError::CircularDependency`] carrying the full
        /// chain (`A -> B -> A`) when `id` is already being resolved.
        pub fn enter(&self, id: &str) -> ContainerResult<LoopTracker> {
            if self.contains(id) {
                let cycle = format!("{} -> {}", self.chain.join(" -> "), id);
                tracing::error!("Circular dependency detected: {}", cycle);
                return Err(ContainerError::CircularDependency(cycle));
            }

            let mut chain = Vec::with_capacity(self.chain.len() + 1);
            chain.extend(self.chain.iter().cloned());
            chain.push(id.to_string());
            Ok(LoopTracker { chain })
        }

        pub fn contains(&self, id: &str) -> bool {
            self.chain.iter().any(|entry| entry == id)
        }

        /// Identifiers in resolution order.
        pub fn chain(&self) -> &[String] {
            &self.chain
        }

        pub fn depth(&self) -> usize {
            self.chain.len()
        }
    }
}
