use serde::{Deserialize, Serialize};

/// Runtime knobs consulted by the accumulator and basin labeller.
///
/// Grounded on `whitebox_common::configs::Configs`: a small serializable
/// struct the caller builds and passes in, rather than one read from a
/// settings file beside an executable (that's CLI plumbing, out of scope
/// here).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Upper bound on worker threads for the accumulator's neighbor-count
    /// prepass and the basin labeller's per-network partition. `None`
    /// defers to the number of available cores.
    pub max_procs: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config { max_procs: None }
    }
}

impl Config {
    pub fn worker_count(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        match self.max_procs {
            Some(n) if n > 0 => n.min(available),
            _ => available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_respects_cap() {
        let cfg = Config { max_procs: Some(1) };
        assert_eq!(cfg.worker_count(), 1);
    }

    #[test]
    fn default_worker_count_is_at_least_one() {
        assert!(Config::default().worker_count() >= 1);
    }
}
