mod banana;
mod budget;
mod infeasible;
mod qp;

use std::cell::RefCell;

use crate::ProgressMonitor;

#[cfg(test)]
#[ctor::ctor]
fn init() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .format_module_path(false)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Records the per-iteration quantities for property checks.
#[derive(Default)]
pub(crate) struct Recorder {
    pub mus: RefCell<Vec<f64>>,
    /// Iteration index after which `update` returns false, if any.
    pub stop_after: Option<usize>,
}

impl ProgressMonitor for Recorder {
    fn update(
        &self,
        iter: usize,
        _obj: f64,
        _inf_pr: f64,
        _inf_du: f64,
        mu: f64,
        _step_norm: f64,
        _alpha_pr: f64,
        _alpha_du: f64,
    ) -> bool {
        self.mus.borrow_mut().push(mu);
        match self.stop_after {
            Some(limit) => iter < limit,
            None => true,
        }
    }
}
