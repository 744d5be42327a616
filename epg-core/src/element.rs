//! Schema-validated records of trajectory data.
//!
//! An [`Element`] stores the fields of one transition or aggregate sample.
//! Construction validates every field against a [`Schema`], so malformed
//! records never reach a buffer. Homogeneous elements can be stacked into a
//! single batched element, optionally normalized batch-wise; [`RunningStats`]
//! provides online normalization from accumulated sums.
use crate::error::ElementError;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Zip};
use std::sync::Arc;

/// Variance floor used by both batch-wise and running normalization.
pub const DEFAULT_EPS: f64 = 0.01;

/// Numeric kind of an element field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dtype {
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

/// A dynamically shaped numeric array held by an element field.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// 32-bit float array.
    F32(ArrayD<f32>),
    /// 64-bit float array.
    F64(ArrayD<f64>),
}

impl Value {
    /// Numeric kind of this value.
    pub fn dtype(&self) -> Dtype {
        match self {
            Value::F32(_) => Dtype::F32,
            Value::F64(_) => Dtype::F64,
        }
    }

    /// Shape of this value.
    pub fn shape(&self) -> &[usize] {
        match self {
            Value::F32(a) => a.shape(),
            Value::F64(a) => a.shape(),
        }
    }

    /// An all-zero value of the given kind and shape.
    pub fn zeros(dtype: Dtype, shape: &[usize]) -> Self {
        match dtype {
            Dtype::F32 => Value::F32(ArrayD::zeros(IxDyn(shape))),
            Dtype::F64 => Value::F64(ArrayD::zeros(IxDyn(shape))),
        }
    }

    /// The underlying array if this is a [`Dtype::F32`] value.
    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Value::F32(a) => Some(a),
            _ => None,
        }
    }

    /// The underlying array if this is a [`Dtype::F64`] value.
    pub fn as_f64(&self) -> Option<&ArrayD<f64>> {
        match self {
            Value::F64(a) => Some(a),
            _ => None,
        }
    }

    fn to_f64(&self) -> ArrayD<f64> {
        match self {
            Value::F32(a) => a.mapv(|x| x as f64),
            Value::F64(a) => a.clone(),
        }
    }

    fn from_f64(dtype: Dtype, a: ArrayD<f64>) -> Self {
        match dtype {
            Dtype::F32 => Value::F32(a.mapv(|x| x as f32)),
            Dtype::F64 => Value::F64(a),
        }
    }

    /// `(x - mean) / max(std, sqrt(eps))` over the whole array.
    fn batch_normalized(self, eps: f64) -> Self {
        match self {
            Value::F32(a) => {
                let n = a.len().max(1) as f32;
                let mean = a.sum() / n;
                let std = (a.mapv(|x| (x - mean) * (x - mean)).sum() / n).sqrt();
                let denom = std.max((eps as f32).sqrt());
                Value::F32(a.mapv(|x| (x - mean) / denom))
            }
            Value::F64(a) => {
                let n = a.len().max(1) as f64;
                let mean = a.sum() / n;
                let std = (a.mapv(|x| (x - mean) * (x - mean)).sum() / n).sqrt();
                let denom = std.max(eps.sqrt());
                Value::F64(a.mapv(|x| (x - mean) / denom))
            }
        }
    }
}

/// Declaration of one element field: name, numeric kind and shape.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    /// Field name.
    pub name: &'static str,
    /// Numeric kind of the field values.
    pub dtype: Dtype,
    /// Shape of the field values.
    pub shape: Vec<usize>,
}

impl FieldSpec {
    /// Declares a field.
    pub fn new(name: &'static str, dtype: Dtype, shape: Vec<usize>) -> Self {
        Self { name, dtype, shape }
    }
}

/// Ordered field declarations shared by all elements of one kind.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Creates a schema from ordered field declarations.
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// The field declarations, in order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of the field with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// An immutable record of named, schema-validated numeric arrays.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Element {
    /// Creates an element, validating every value against the schema.
    pub fn new(schema: &Arc<Schema>, values: Vec<Value>) -> Result<Self, ElementError> {
        if values.len() != schema.len() {
            return Err(ElementError::FieldCount {
                expected: schema.len(),
                actual: values.len(),
            });
        }
        for (spec, value) in schema.fields().iter().zip(values.iter()) {
            if value.dtype() != spec.dtype {
                return Err(ElementError::DtypeMismatch {
                    name: spec.name,
                    expected: spec.dtype,
                    actual: value.dtype(),
                });
            }
            if value.shape() != spec.shape.as_slice() {
                return Err(ElementError::ShapeMismatch {
                    name: spec.name,
                    expected: spec.shape.clone(),
                    actual: value.shape().to_vec(),
                });
            }
        }
        Ok(Self {
            schema: schema.clone(),
            values,
        })
    }

    /// Creates an element from `(name, value)` pairs in any order.
    pub fn from_pairs(
        schema: &Arc<Schema>,
        pairs: Vec<(&str, Value)>,
    ) -> Result<Self, ElementError> {
        let mut slots: Vec<Option<Value>> = (0..schema.len()).map(|_| None).collect();
        for (name, value) in pairs {
            let i = schema
                .index_of(name)
                .ok_or_else(|| ElementError::UnknownField(name.to_string()))?;
            slots[i] = Some(value);
        }
        let mut values = Vec::with_capacity(schema.len());
        for (spec, slot) in schema.fields().iter().zip(slots) {
            values.push(slot.ok_or_else(|| ElementError::MissingField(spec.name.to_string()))?);
        }
        Self::new(schema, values)
    }

    /// Creates an all-zero element, used to initialize normalization
    /// accumulators.
    pub fn zeros(schema: &Arc<Schema>) -> Self {
        let values = schema
            .fields()
            .iter()
            .map(|f| Value::zeros(f.dtype, &f.shape))
            .collect();
        Self {
            schema: schema.clone(),
            values,
        }
    }

    /// The schema this element was validated against.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The field values, in schema order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The value of the field with the given name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).map(|i| &self.values[i])
    }

    /// Stacks homogeneous elements field-wise into one batched element.
    ///
    /// Each field of shape `s` becomes a field of shape `(n, s...)` where `n`
    /// is the number of elements. Fields named in `normalize` are normalized
    /// batch-wise to approximately zero mean and unit variance, with the
    /// standard deviation floored at `sqrt(DEFAULT_EPS)`.
    pub fn stack(elements: &[Element], normalize: &[&str]) -> Result<Element, ElementError> {
        let first = elements.first().ok_or(ElementError::EmptyStack)?;
        let schema = first.schema.clone();
        if elements.iter().any(|e| e.schema.as_ref() != schema.as_ref()) {
            return Err(ElementError::SchemaMismatch);
        }
        for name in normalize {
            if schema.index_of(name).is_none() {
                return Err(ElementError::UnknownField(name.to_string()));
            }
        }

        let mut values = Vec::with_capacity(schema.len());
        for (i, spec) in schema.fields().iter().enumerate() {
            let stacked = match spec.dtype {
                Dtype::F32 => {
                    let views: Vec<ArrayViewD<f32>> = elements
                        .iter()
                        .map(|e| e.values[i].as_f32().map(|a| a.view()))
                        .collect::<Option<_>>()
                        .ok_or(ElementError::SchemaMismatch)?;
                    Value::F32(
                        ndarray::stack(Axis(0), &views)
                            .map_err(|_| ElementError::SchemaMismatch)?,
                    )
                }
                Dtype::F64 => {
                    let views: Vec<ArrayViewD<f64>> = elements
                        .iter()
                        .map(|e| e.values[i].as_f64().map(|a| a.view()))
                        .collect::<Option<_>>()
                        .ok_or(ElementError::SchemaMismatch)?;
                    Value::F64(
                        ndarray::stack(Axis(0), &views)
                            .map_err(|_| ElementError::SchemaMismatch)?,
                    )
                }
            };
            let stacked = if normalize.contains(&spec.name) {
                stacked.batch_normalized(DEFAULT_EPS)
            } else {
                stacked
            };
            values.push(stacked);
        }

        let fields = schema
            .fields()
            .iter()
            .map(|f| {
                let mut shape = Vec::with_capacity(f.shape.len() + 1);
                shape.push(elements.len());
                shape.extend_from_slice(&f.shape);
                FieldSpec::new(f.name, f.dtype, shape)
            })
            .collect();
        Element::new(&Arc::new(Schema::new(fields)), values)
    }
}

/// Online normalization statistics over selected element fields.
///
/// Keeps a running sum, sum-of-squares and count; [`RunningStats::normalize`]
/// rescales an element by the accumulated mean and variance. The variance
/// estimate is floored at `eps` and can never go negative.
pub struct RunningStats {
    schema: Arc<Schema>,
    tracked: Vec<usize>,
    sums: Vec<ArrayD<f64>>,
    sums_sqr: Vec<ArrayD<f64>>,
    count: usize,
}

impl RunningStats {
    /// Creates zeroed statistics tracking the given fields of `schema`.
    pub fn new(schema: &Arc<Schema>, fields: &[&str]) -> Result<Self, ElementError> {
        let mut tracked = Vec::with_capacity(fields.len());
        let mut sums = Vec::with_capacity(fields.len());
        let mut sums_sqr = Vec::with_capacity(fields.len());
        for name in fields {
            let i = schema
                .index_of(name)
                .ok_or_else(|| ElementError::UnknownField(name.to_string()))?;
            let shape = IxDyn(&schema.fields()[i].shape);
            tracked.push(i);
            sums.push(ArrayD::zeros(shape.clone()));
            sums_sqr.push(ArrayD::zeros(shape));
        }
        Ok(Self {
            schema: schema.clone(),
            tracked,
            sums,
            sums_sqr,
            count: 0,
        })
    }

    /// Number of elements accumulated so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Folds one element into the running sums.
    pub fn update(&mut self, element: &Element) -> Result<(), ElementError> {
        if element.schema().as_ref() != self.schema.as_ref() {
            return Err(ElementError::SchemaMismatch);
        }
        for (k, &i) in self.tracked.iter().enumerate() {
            let value = element.values()[i].to_f64();
            self.sums[k] += &value;
            self.sums_sqr[k] += &value.mapv(|x| x * x);
        }
        self.count += 1;
        Ok(())
    }

    /// Normalizes the tracked fields of `element` by the running mean and
    /// variance, flooring the variance at `eps`.
    pub fn normalize(&self, element: &Element, eps: f64) -> Result<Element, ElementError> {
        if element.schema().as_ref() != self.schema.as_ref() {
            return Err(ElementError::SchemaMismatch);
        }
        if self.count == 0 {
            return Err(ElementError::NoStatistics);
        }
        let n = self.count as f64;
        let mut values = element.values().to_vec();
        for (k, &i) in self.tracked.iter().enumerate() {
            let mut out = values[i].to_f64();
            Zip::from(&mut out)
                .and(&self.sums[k])
                .and(&self.sums_sqr[k])
                .for_each(|o, &s, &ss| {
                    let mean = s / n;
                    let var = ((ss - s * s / n) / n).max(eps);
                    *o = (*o - mean) / var.sqrt();
                });
            values[i] = Value::from_f64(self.schema.fields()[i].dtype, out);
        }
        Element::new(&self.schema, values)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::arr1;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            FieldSpec::new("obs", Dtype::F32, vec![2]),
            FieldSpec::new("reward", Dtype::F32, vec![1]),
        ]))
    }

    fn element(obs: [f32; 2], reward: f32) -> Element {
        Element::new(
            &schema(),
            vec![
                Value::F32(arr1(&obs).into_dyn()),
                Value::F32(arr1(&[reward]).into_dyn()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_wrong_dtype() {
        let err = Element::new(
            &schema(),
            vec![
                Value::F64(arr1(&[0.0f64, 1.0]).into_dyn()),
                Value::F32(arr1(&[0.0f32]).into_dyn()),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ElementError::DtypeMismatch { name: "obs", .. }));
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let err = Element::new(
            &schema(),
            vec![
                Value::F32(arr1(&[0.0f32, 1.0, 2.0]).into_dyn()),
                Value::F32(arr1(&[0.0f32]).into_dyn()),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ElementError::ShapeMismatch { name: "obs", .. }));
    }

    #[test]
    fn test_from_pairs_rejects_unknown_field() {
        let err = Element::from_pairs(
            &schema(),
            vec![("junk", Value::F32(arr1(&[0.0f32]).into_dyn()))],
        )
        .unwrap_err();
        assert!(matches!(err, ElementError::UnknownField(_)));
    }

    #[test]
    fn test_zeros_matches_schema() {
        let zero = Element::zeros(&schema());
        assert_eq!(zero.get("obs").unwrap().shape(), &[2]);
        assert_eq!(zero.get("reward").unwrap().shape(), &[1]);
    }

    #[test]
    fn test_stack_shapes() {
        let elements = vec![
            element([0.0, 1.0], 0.5),
            element([2.0, 3.0], 1.5),
            element([4.0, 5.0], 2.5),
        ];
        let stacked = Element::stack(&elements, &[]).unwrap();
        assert_eq!(stacked.get("obs").unwrap().shape(), &[3, 2]);
        assert_eq!(stacked.get("reward").unwrap().shape(), &[3, 1]);
    }

    #[test]
    fn test_stack_normalizes_selected_fields() {
        let elements = vec![
            element([0.0, 10.0], 0.0),
            element([20.0, 30.0], 0.0),
            element([40.0, 50.0], 0.0),
        ];
        let stacked = Element::stack(&elements, &["obs"]).unwrap();
        let obs = stacked.get("obs").unwrap().as_f32().unwrap();
        let n = obs.len() as f32;
        let mean = obs.sum() / n;
        let var = obs.mapv(|x| (x - mean) * (x - mean)).sum() / n;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_running_normalization_of_identical_elements_is_zero() {
        let e = element([3.0, -2.0], 1.0);
        let mut stats = RunningStats::new(&schema(), &["obs", "reward"]).unwrap();
        for _ in 0..5 {
            stats.update(&e).unwrap();
        }
        assert_eq!(stats.count(), 5);
        let normalized = stats.normalize(&e, DEFAULT_EPS).unwrap();
        for value in normalized.values() {
            let a = value.as_f32().unwrap();
            assert!(a.iter().all(|x| x.abs() < 1e-6));
        }
    }

    #[test]
    fn test_running_variance_floor() {
        // Identical samples give zero variance; the floor keeps the
        // denominator at sqrt(eps).
        let e = element([1.0, 1.0], 1.0);
        let offset = element([2.0, 2.0], 2.0);
        let mut stats = RunningStats::new(&schema(), &["obs"]).unwrap();
        stats.update(&e).unwrap();
        stats.update(&e).unwrap();
        let normalized = stats.normalize(&offset, DEFAULT_EPS).unwrap();
        let obs = normalized.get("obs").unwrap().as_f32().unwrap();
        let expected = (2.0 - 1.0) / (DEFAULT_EPS as f32).sqrt();
        assert!(obs.iter().all(|x| (x - expected).abs() < 1e-4));
    }

    #[test]
    fn test_normalize_without_statistics_fails() {
        let stats = RunningStats::new(&schema(), &["obs"]).unwrap();
        let err = stats.normalize(&element([0.0, 0.0], 0.0), DEFAULT_EPS).unwrap_err();
        assert!(matches!(err, ElementError::NoStatistics));
    }
}
