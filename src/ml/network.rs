use tch::{nn, Tensor};

/// Bounded output of a network together with its pre-activation logits.
#[derive(Debug)]
pub struct NetOutput {
    pub probs: Tensor,
    pub logits: Tensor,
}

impl NetOutput {
    pub fn from_logits(logits: Tensor) -> Self {
        Self { probs: logits.sigmoid(), logits }
    }

    pub fn detach(&self) -> Self {
        Self { probs: self.probs.detach(), logits: self.logits.detach() }
    }
}

/// A parametric module that owns its parameter store.
///
/// `forward` records the evaluation for backpropagation; `forward_reusing_params`
/// evaluates the very same parameters outside of the autograd graph. Both
/// normalize with batch statistics, so for identical weights and inputs they
/// return identical values.
pub trait AdversarialNetwork {
    fn name(&self) -> &'static str;

    fn forward_t(&self, xs: &Tensor, train: bool) -> NetOutput;

    fn var_store(&self) -> &nn::VarStore;

    fn forward(&self, xs: &Tensor) -> NetOutput {
        self.forward_t(xs, true)
    }

    fn forward_reusing_params(&self, xs: &Tensor) -> NetOutput {
        tch::no_grad(|| self.forward_t(xs, true))
    }

    fn trainable_variables(&self) -> Vec<Tensor> {
        self.var_store().trainable_variables()
    }

    fn parameter_count(&self) -> i64 {
        self.trainable_variables().iter().map(|t| t.numel() as i64).sum()
    }
}
