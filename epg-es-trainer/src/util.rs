//! Perturbation sampling and the ES gradient estimator.
use anyhow::{ensure, Result};
use candle_core::{Device, Tensor};
use epg_candle_agent::{util::array_from_tensor, PhiParams};

/// Draws one perturbation of `phi`: per parameter, a same-shaped
/// standard-normal sample scaled by `sigma` and added to the current value.
///
/// Returns `(noise, perturbed)`; the raw noise is needed later by the
/// gradient estimate.
pub fn perturb(phi: &PhiParams, sigma: f64, device: &Device) -> Result<(PhiParams, PhiParams)> {
    let mut noise = PhiParams::new();
    let mut perturbed = PhiParams::new();
    for (name, value) in phi.iter() {
        let sample = Tensor::randn(0f32, 1f32, value.shape(), device)?;
        let sample = array_from_tensor(&sample)?;
        let shifted = value + &sample.mapv(|x| x * sigma as f32);
        noise.insert(name.clone(), sample);
        perturbed.insert(name.clone(), shifted);
    }
    Ok((noise, perturbed))
}

/// Finite-difference estimate of the return gradient with respect to phi.
///
/// `group_returns[v]` is the mean return of the workers that evaluated
/// perturbation `v`, and `noises[v]` its noise draw; each parameter's
/// gradient is the return-weighted sum of the noise samples divided by
/// `sigma * V`.
pub fn es_gradient(
    noises: &[PhiParams],
    group_returns: &[f32],
    sigma: f64,
) -> Result<PhiParams> {
    ensure!(!noises.is_empty(), "at least one perturbation is required");
    ensure!(
        noises.len() == group_returns.len(),
        "got {} noise draws but {} group returns",
        noises.len(),
        group_returns.len()
    );
    let scale = 1.0 / (sigma as f32 * noises.len() as f32);
    let mut grad = PhiParams::new();
    for (noise, &ret) in noises.iter().zip(group_returns.iter()) {
        for (name, sample) in noise.iter() {
            let weighted = sample.mapv(|x| x * ret);
            match grad.get_mut(name) {
                Some(acc) => *acc += &weighted,
                None => {
                    grad.insert(name.clone(), weighted);
                }
            }
        }
    }
    for value in grad.values_mut() {
        value.mapv_inplace(|x| x * scale);
    }
    Ok(grad)
}

#[cfg(test)]
mod test {
    use super::{es_gradient, perturb};
    use epg_candle_agent::PhiParams;
    use ndarray::arr1;

    fn phi_with(name: &str, values: &[f32]) -> PhiParams {
        let mut phi = PhiParams::new();
        phi.insert(name.to_string(), arr1(values).into_dyn());
        phi
    }

    #[test]
    fn test_perturb_keeps_shapes_and_records_noise() {
        let phi = phi_with("w", &[1.0, 2.0, 3.0]);
        let (noise, perturbed) = perturb(&phi, 0.5, &candle_core::Device::Cpu).unwrap();
        let n = &noise["w"];
        let p = &perturbed["w"];
        assert_eq!(n.shape(), &[3]);
        for i in 0..3 {
            let expected = phi["w"][[i]] + 0.5 * n[[i]];
            assert!((p[[i]] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_es_gradient_degenerate_case() {
        // Identical group returns reduce the estimate to the equally
        // weighted mean of the noise samples, scaled by R / sigma.
        let sigma = 2.0;
        let ret = 5.0f32;
        let noises = vec![phi_with("w", &[1.0, 2.0]), phi_with("w", &[3.0, 4.0])];
        let grad = es_gradient(&noises, &[ret, ret], sigma).unwrap();
        let mean_noise = [2.0f32, 3.0];
        for i in 0..2 {
            let expected = ret / sigma as f32 * mean_noise[i];
            assert!((grad["w"][[i]] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_es_gradient_rejects_mismatched_lengths() {
        let noises = vec![phi_with("w", &[1.0])];
        assert!(es_gradient(&noises, &[1.0, 2.0], 1.0).is_err());
    }
}
