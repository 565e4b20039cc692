//! Fixed-topology feed-forward autoencoder.
//!
//! ```text
//! input ─ Dense ─ chaos ─ Dense ─ chaos ─► latent
//!                                            │
//! recon ◄─ sigmoid ─ Dense ─ chaos ─ Dense ◄─┘
//! ```
//!
//! The encoder half produces the latent vector used for key derivation; the
//! decoder half exists only to give training a reconstruction signal.

use rand::Rng;

use crate::image::IMAGE_PIXELS;

/// Width of both hidden layers.
pub const HIDDEN_DIM: usize = 128;

/// Width of the latent layer.
pub const LATENT_DIM: usize = 64;

pub(crate) const ENC1: usize = 0;
pub(crate) const ENC2: usize = 1;
pub(crate) const DEC1: usize = 2;
pub(crate) const DEC2: usize = 3;

/// Layer widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    /// Input (and reconstruction) width
    pub input: usize,
    /// Hidden layer width (encoder and decoder)
    pub hidden: usize,
    /// Latent width
    pub latent: usize,
}

impl Default for Topology {
    fn default() -> Self {
        Self { input: IMAGE_PIXELS, hidden: HIDDEN_DIM, latent: LATENT_DIM }
    }
}

/// `sin(8x) + 0.5·tanh(4x)`.
pub fn chaos_activation(x: f32) -> f32 {
    (8.0 * x).sin() + 0.5 * (4.0 * x).tanh()
}

/// Derivative of [`chaos_activation`].
pub fn chaos_derivative(x: f32) -> f32 {
    let t = (4.0 * x).tanh();
    8.0 * (8.0 * x).cos() + 2.0 * (1.0 - t * t)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Fully connected layer, weights stored row-major `[outputs][inputs]`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Dense {
    pub(crate) inputs: usize,
    pub(crate) outputs: usize,
    pub(crate) weights: Vec<f32>,
    pub(crate) bias: Vec<f32>,
}

impl Dense {
    pub(crate) fn zeros(inputs: usize, outputs: usize) -> Self {
        Self { inputs, outputs, weights: vec![0.0; inputs * outputs], bias: vec![0.0; outputs] }
    }

    /// Glorot-uniform weights, zero bias.
    fn glorot<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (inputs + outputs) as f32).sqrt();
        let weights = (0..inputs * outputs).map(|_| rng.gen_range(-limit..limit)).collect();
        Self { inputs, outputs, weights, bias: vec![0.0; outputs] }
    }

    fn forward(&self, x: &[f32]) -> Vec<f32> {
        debug_assert_eq!(x.len(), self.inputs);
        self.weights
            .chunks_exact(self.inputs)
            .zip(&self.bias)
            .map(|(row, b)| b + row.iter().zip(x).map(|(w, xi)| w * xi).sum::<f32>())
            .collect()
    }

    /// Accumulate parameter gradients for one sample into `grads`.
    fn accumulate(&self, x: &[f32], grad_out: &[f32], grads: &mut Dense) {
        for ((row, gb), &g) in
            grads.weights.chunks_exact_mut(self.inputs).zip(&mut grads.bias).zip(grad_out)
        {
            *gb += g;
            for (gw, xi) in row.iter_mut().zip(x) {
                *gw += g * xi;
            }
        }
    }

    /// Gradient with respect to this layer's input.
    fn input_gradient(&self, grad_out: &[f32]) -> Vec<f32> {
        let mut grad_in = vec![0.0; self.inputs];
        for (row, &g) in self.weights.chunks_exact(self.inputs).zip(grad_out) {
            for (gi, w) in grad_in.iter_mut().zip(row) {
                *gi += g * w;
            }
        }
        grad_in
    }

    fn add_assign(&mut self, other: &Dense) {
        for (a, b) in self.weights.iter_mut().zip(&other.weights) {
            *a += b;
        }
        for (a, b) in self.bias.iter_mut().zip(&other.bias) {
            *a += b;
        }
    }

    fn is_finite(&self) -> bool {
        self.weights.iter().chain(&self.bias).all(|v| v.is_finite())
    }
}

/// Intermediate values of one forward pass, kept for backprop.
pub(crate) struct ForwardCache {
    h1_pre: Vec<f32>,
    h1: Vec<f32>,
    z_pre: Vec<f32>,
    pub(crate) z: Vec<f32>,
    h2_pre: Vec<f32>,
    h2: Vec<f32>,
    pub(crate) out: Vec<f32>,
}

/// Autoencoder weights.
///
/// Cloned wholesale for training; the trained copy replaces the published
/// one atomically, so a `Network` is never mutated while readers hold it.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    topology: Topology,
    pub(crate) layers: [Dense; 4],
}

impl Network {
    /// Randomly initialized network.
    pub fn initialize<R: Rng + ?Sized>(topology: Topology, rng: &mut R) -> Self {
        let Topology { input, hidden, latent } = topology;
        Self {
            topology,
            layers: [
                Dense::glorot(input, hidden, rng),
                Dense::glorot(hidden, latent, rng),
                Dense::glorot(latent, hidden, rng),
                Dense::glorot(hidden, input, rng),
            ],
        }
    }

    /// All-zero network with the same shape, used as a gradient buffer.
    pub(crate) fn zeros(topology: Topology) -> Self {
        let Topology { input, hidden, latent } = topology;
        Self {
            topology,
            layers: [
                Dense::zeros(input, hidden),
                Dense::zeros(hidden, latent),
                Dense::zeros(latent, hidden),
                Dense::zeros(hidden, input),
            ],
        }
    }

    /// Layer widths.
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Encoder half: input → latent.
    pub fn encode(&self, input: &[f32]) -> Vec<f32> {
        let h1: Vec<f32> =
            self.layers[ENC1].forward(input).into_iter().map(chaos_activation).collect();
        self.layers[ENC2].forward(&h1).into_iter().map(chaos_activation).collect()
    }

    /// Full pass: input → reconstruction.
    pub fn reconstruct(&self, input: &[f32]) -> Vec<f32> {
        self.forward_cached(input).out
    }

    pub(crate) fn forward_cached(&self, input: &[f32]) -> ForwardCache {
        let h1_pre = self.layers[ENC1].forward(input);
        let h1: Vec<f32> = h1_pre.iter().copied().map(chaos_activation).collect();
        let z_pre = self.layers[ENC2].forward(&h1);
        let z: Vec<f32> = z_pre.iter().copied().map(chaos_activation).collect();
        let h2_pre = self.layers[DEC1].forward(&z);
        let h2: Vec<f32> = h2_pre.iter().copied().map(chaos_activation).collect();
        let out = self.layers[DEC2].forward(&h2).into_iter().map(sigmoid).collect();

        ForwardCache { h1_pre, h1, z_pre, z, h2_pre, h2, out }
    }

    /// Backpropagate one sample.
    ///
    /// `out_scale` multiplies `(out - input)` to give the loss gradient at the
    /// reconstruction; `latent_grad` is added at the latent layer (the
    /// variance regularizer). The first layer's gradient is skipped when
    /// `freeze_first` is set.
    pub(crate) fn backward(
        &self,
        input: &[f32],
        cache: &ForwardCache,
        out_scale: f32,
        latent_grad: &[f32],
        freeze_first: bool,
        grads: &mut Network,
    ) {
        let d_out_pre: Vec<f32> = cache
            .out
            .iter()
            .zip(input)
            .map(|(&o, &x)| out_scale * (o - x) * o * (1.0 - o))
            .collect();
        self.layers[DEC2].accumulate(&cache.h2, &d_out_pre, &mut grads.layers[DEC2]);

        let d_h2_pre = through_chaos(self.layers[DEC2].input_gradient(&d_out_pre), &cache.h2_pre);
        self.layers[DEC1].accumulate(&cache.z, &d_h2_pre, &mut grads.layers[DEC1]);

        let mut d_z = self.layers[DEC1].input_gradient(&d_h2_pre);
        for (dz, extra) in d_z.iter_mut().zip(latent_grad) {
            *dz += extra;
        }
        let d_z_pre = through_chaos(d_z, &cache.z_pre);
        self.layers[ENC2].accumulate(&cache.h1, &d_z_pre, &mut grads.layers[ENC2]);

        if freeze_first {
            return;
        }
        let d_h1_pre = through_chaos(self.layers[ENC2].input_gradient(&d_z_pre), &cache.h1_pre);
        self.layers[ENC1].accumulate(input, &d_h1_pre, &mut grads.layers[ENC1]);
    }

    pub(crate) fn add_assign(&mut self, other: &Network) {
        for (a, b) in self.layers.iter_mut().zip(&other.layers) {
            a.add_assign(b);
        }
    }

    /// True if no parameter is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.layers.iter().all(Dense::is_finite)
    }
}

fn through_chaos(mut grad: Vec<f32>, pre: &[f32]) -> Vec<f32> {
    for (g, &p) in grad.iter_mut().zip(pre) {
        *g *= chaos_derivative(p);
    }
    grad
}
