/// Patience-based early stopping on validation loss.
///
/// An epoch counts as an improvement only when its loss is at least `delta` below
/// the best seen so far. `patience` consecutive non-improving epochs stop training.
#[derive(Debug, Clone, PartialEq)]
pub struct EarlyStopping {
    patience: usize,
    delta: f32,
    best: Option<f32>,
    counter: usize,
    stopped: bool,
}

impl EarlyStopping {
    pub fn new(patience: usize, delta: f32) -> Self {
        Self {
            patience,
            delta,
            best: None,
            counter: 0,
            stopped: false,
        }
    }

    /// Records one epoch's validation loss. Returns `true` once training should stop.
    pub fn step(&mut self, val_loss: f32) -> bool {
        match self.best {
            None => self.best = Some(val_loss),
            Some(best) if val_loss > best - self.delta => {
                self.counter += 1;
                if self.counter >= self.patience {
                    self.stopped = true;
                }
            }
            Some(_) => {
                self.best = Some(val_loss);
                self.counter = 0;
            }
        }
        self.stopped
    }

    pub fn best(&self) -> Option<f32> {
        self.best
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn should_stop(&self) -> bool {
        self.stopped
    }
}
