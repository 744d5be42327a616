//! Transition records pushed into trajectory buffers.
use crate::error::ElementError;
use crate::{Dtype, Element, FieldSpec, Schema, Value};
use ndarray::Array1;
use std::sync::Arc;

/// Name of the state field.
pub const STATE: &str = "state";
/// Name of the termination-flag field.
pub const TERMINAL: &str = "terminal";
/// Name of the reward field.
pub const REWARD: &str = "reward";

/// Schema of one `(state, terminal, reward)` transition.
pub fn schema(obs_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        FieldSpec::new(STATE, Dtype::F32, vec![obs_dim]),
        FieldSpec::new(TERMINAL, Dtype::F32, vec![1]),
        FieldSpec::new(REWARD, Dtype::F32, vec![1]),
    ]))
}

/// Builds one transition element, validated against `schema`.
pub fn make(
    schema: &Arc<Schema>,
    state: &[f32],
    terminal: bool,
    reward: f32,
) -> Result<Element, ElementError> {
    let terminal = if terminal { 1.0 } else { 0.0 };
    Element::new(
        schema,
        vec![
            Value::F32(Array1::from(state.to_vec()).into_dyn()),
            Value::F32(Array1::from(vec![terminal]).into_dyn()),
            Value::F32(Array1::from(vec![reward]).into_dyn()),
        ],
    )
}

#[cfg(test)]
mod test {
    use super::{make, schema, REWARD, STATE, TERMINAL};
    use crate::Element;

    #[test]
    fn test_make_and_stack() {
        let schema = schema(3);
        let elements = vec![
            make(&schema, &[0.0, 1.0, 2.0], false, 0.5).unwrap(),
            make(&schema, &[3.0, 4.0, 5.0], true, -1.0).unwrap(),
        ];
        let stacked = Element::stack(&elements, &[]).unwrap();
        assert_eq!(stacked.get(STATE).unwrap().shape(), &[2, 3]);
        assert_eq!(stacked.get(TERMINAL).unwrap().shape(), &[2, 1]);
        assert_eq!(stacked.get(REWARD).unwrap().shape(), &[2, 1]);
        let terminal = stacked.get(TERMINAL).unwrap().as_f32().unwrap();
        assert_eq!(terminal.as_slice().unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn test_make_rejects_wrong_state_len() {
        let schema = schema(3);
        assert!(make(&schema, &[0.0, 1.0], false, 0.0).is_err());
    }
}
