/// Multiplies the learning rate by `factor` once the monitored loss has failed
/// to improve (relative threshold 1e-4) for more than `patience` epochs,
/// never going below `min_lr`.
#[derive(Debug, Clone)]
pub struct PlateauScheduler {
    lr: f64,
    factor: f64,
    patience: usize,
    min_lr: f64,
    threshold: f64,
    best: f64,
    bad_epochs: usize,
}

impl PlateauScheduler {
    pub fn new(initial_lr: f64, factor: f64, patience: usize, min_lr: f64) -> Self {
        Self {
            lr: initial_lr,
            factor,
            patience,
            min_lr,
            threshold: 1e-4,
            best: f64::INFINITY,
            bad_epochs: 0,
        }
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Records one epoch's loss. Returns the new rate when it was reduced.
    pub fn step(&mut self, loss: f64) -> Option<f64> {
        if loss < self.best * (1.0 - self.threshold) {
            self.best = loss;
            self.bad_epochs = 0;
        } else {
            self.bad_epochs += 1;
        }

        if self.bad_epochs <= self.patience {
            return None;
        }
        self.bad_epochs = 0;

        let reduced = (self.lr * self.factor).max(self.min_lr);
        if self.lr - reduced > 1e-8 {
            self.lr = reduced;
            Some(reduced)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Strictly better than every earlier epoch.
    Improved,
    /// No improvement; carries the current stall count.
    Stalled(usize),
    /// Stall count reached the patience.
    Stop,
}

/// Tracks the best validation loss and how many epochs have passed without
/// beating it.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best: f64,
    best_epoch: Option<usize>,
    stall: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f64::INFINITY,
            best_epoch: None,
            stall: 0,
        }
    }

    pub fn observe(&mut self, epoch: usize, loss: f64) -> Verdict {
        if loss < self.best {
            self.best = loss;
            self.best_epoch = Some(epoch);
            self.stall = 0;
            return Verdict::Improved;
        }
        self.stall += 1;
        if self.stall >= self.patience {
            Verdict::Stop
        } else {
            Verdict::Stalled(self.stall)
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_after_patience_is_exceeded() {
        let mut s = PlateauScheduler::new(1e-3, 0.5, 2, 1e-5);
        assert_eq!(s.step(1.0), None);
        assert_eq!(s.step(1.0), None);
        assert_eq!(s.step(1.0), None);
        assert_eq!(s.step(1.0), Some(5e-4));
        assert_eq!(s.lr(), 5e-4);
        // counter restarts after a reduction
        assert_eq!(s.step(1.0), None);
    }

    #[test]
    fn improvement_resets_plateau() {
        let mut s = PlateauScheduler::new(1e-3, 0.5, 1, 1e-5);
        s.step(1.0);
        s.step(1.0);
        assert_eq!(s.step(0.5), None);
        assert_eq!(s.step(0.5), None);
        assert_eq!(s.lr(), 1e-3);
    }

    #[test]
    fn rate_is_floored() {
        let mut s = PlateauScheduler::new(3e-5, 0.5, 0, 1e-5);
        s.step(1.0);
        assert_eq!(s.step(1.0), Some(1.5e-5));
        assert_eq!(s.step(1.0), Some(1e-5));
        assert_eq!(s.step(1.0), None);
        assert_eq!(s.lr(), 1e-5);
    }

    #[test]
    fn stops_patience_epochs_after_minimum() {
        let patience = 3;
        let mut es = EarlyStopping::new(patience);
        let losses = [0.9, 0.7, 0.5, 0.5, 0.6, 0.6, 0.8, 0.9];

        let mut stopped_at = None;
        for (i, &loss) in losses.iter().enumerate() {
            let epoch = i + 1;
            if es.observe(epoch, loss) == Verdict::Stop {
                stopped_at = Some(epoch);
                break;
            }
        }
        assert_eq!(es.best_epoch(), Some(3));
        assert_eq!(es.best(), 0.5);
        assert_eq!(stopped_at, Some(3 + patience));
    }

    #[test]
    fn equal_loss_is_not_an_improvement() {
        let mut es = EarlyStopping::new(5);
        assert_eq!(es.observe(1, 0.4), Verdict::Improved);
        assert_eq!(es.observe(2, 0.4), Verdict::Stalled(1));
        assert_eq!(es.observe(3, 0.3), Verdict::Improved);
        assert_eq!(es.best_epoch(), Some(3));
    }
}
