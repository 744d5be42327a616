//! Conversions between `ndarray` arrays and candle tensors.
use anyhow::Result;
use candle_core::{Device, Tensor};
use ndarray::{ArrayD, IxDyn};

/// Copies an `f32` array into a tensor on the given device.
pub fn tensor_from_array(a: &ArrayD<f32>, device: &Device) -> Result<Tensor> {
    let data: Vec<f32> = a.iter().copied().collect();
    Ok(Tensor::from_vec(data, a.shape(), device)?)
}

/// Copies a tensor into an `f32` array of the same shape.
pub fn array_from_tensor(t: &Tensor) -> Result<ArrayD<f32>> {
    let dims = t.dims().to_vec();
    let data = t.flatten_all()?.to_vec1::<f32>()?;
    Ok(ArrayD::from_shape_vec(IxDyn(&dims), data)?)
}

#[cfg(test)]
mod test {
    use super::{array_from_tensor, tensor_from_array};
    use candle_core::Device;
    use ndarray::ArrayD;

    #[test]
    fn test_round_trip() {
        let a = ArrayD::from_shape_vec(
            ndarray::IxDyn(&[2, 3]),
            vec![0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap();
        let t = tensor_from_array(&a, &Device::Cpu).unwrap();
        assert_eq!(t.dims(), &[2, 3]);
        assert_eq!(array_from_tensor(&t).unwrap(), a);
    }
}
