use neuropt_core::{NeuroptError, NeuroptResult};
use serde::{Deserialize, Serialize};

use crate::mlp::MultilayerPerceptron;
use crate::network::NeuralNetwork;
use crate::perceptron::LayerSpec;
use crate::probabilistic::ProbabilisticLayer;
use crate::processing::{BoundingLayer, ScalingLayer, UnscalingLayer};

/// Serializable snapshot of a network: topology, activation kinds, the flat
/// parameter vector and every fixed layer's settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub layers: Vec<LayerSpec>,
    pub parameters: Vec<f64>,
    #[serde(default)]
    pub scaling: Option<ScalingLayer>,
    #[serde(default)]
    pub unscaling: Option<UnscalingLayer>,
    #[serde(default)]
    pub probabilistic: Option<ProbabilisticLayer>,
    #[serde(default)]
    pub bounding: Option<BoundingLayer>,
}

impl NetworkDescriptor {
    pub fn to_json(&self) -> NeuroptResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| NeuroptError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> NeuroptResult<Self> {
        serde_json::from_str(json).map_err(|e| NeuroptError::Serialization(e.to_string()))
    }
}

impl NeuralNetwork {
    pub fn to_descriptor(&self) -> NetworkDescriptor {
        NetworkDescriptor {
            layers: self.perceptron.layer_specs(),
            parameters: self.perceptron.parameters().to_vec(),
            scaling: self.scaling.clone(),
            unscaling: self.unscaling.clone(),
            probabilistic: self.probabilistic,
            bounding: self.bounding.clone(),
        }
    }

    /// Rebuilds a network, validating chaining, parameter count and fixed
    /// layer sizes.
    pub fn from_descriptor(descriptor: &NetworkDescriptor) -> NeuroptResult<Self> {
        let perceptron =
            MultilayerPerceptron::from_parameters(&descriptor.layers, descriptor.parameters.clone())?;
        let mut network = NeuralNetwork::new(perceptron);
        if let Some(s) = &descriptor.scaling {
            network = network.with_scaling_layer(s.clone())?;
        }
        if let Some(u) = &descriptor.unscaling {
            network = network.with_unscaling_layer(u.clone())?;
        }
        if let Some(p) = descriptor.probabilistic {
            network = network.with_probabilistic_layer(p);
        }
        if let Some(b) = &descriptor.bounding {
            network = network.with_bounding_layer(b.clone())?;
        }
        Ok(network)
    }

    pub fn to_json(&self) -> NeuroptResult<String> {
        self.to_descriptor().to_json()
    }

    pub fn from_json(json: &str) -> NeuroptResult<Self> {
        Self::from_descriptor(&NetworkDescriptor::from_json(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use crate::probabilistic::ProbabilisticMethod;
    use neuropt_core::{ScalingMethod, Statistics};

    fn network() -> NeuralNetwork {
        let mut mlp = MultilayerPerceptron::with_activations(
            &[3, 4, 2],
            Activation::Logistic,
            Activation::Softmax,
        )
        .unwrap();
        mlp.randomize_normal(0.0, 0.5, Some(1));
        NeuralNetwork::new(mlp)
            .with_scaling_layer(ScalingLayer::new(
                ScalingMethod::MeanStandardDeviation,
                vec![Statistics::new(0.0, 1.0, 0.5, 0.1); 3],
            ))
            .unwrap()
            .with_probabilistic_layer(ProbabilisticLayer::new(ProbabilisticMethod::Competitive))
    }

    #[test]
    fn test_descriptor_roundtrip() {
        let net = network();
        let rebuilt = NeuralNetwork::from_descriptor(&net.to_descriptor()).unwrap();
        assert_eq!(rebuilt, net);
    }

    #[test]
    fn test_json_roundtrip() {
        let net = network();
        let json = net.to_json().unwrap();
        assert!(json.contains("\"Softmax\""));
        let rebuilt = NeuralNetwork::from_json(&json).unwrap();
        assert_eq!(rebuilt.parameters(), net.parameters());
        assert_eq!(rebuilt.perceptron().layer_specs(), net.perceptron().layer_specs());
        assert_eq!(rebuilt.forward(&[0.1, 0.2, 0.3]).unwrap(), net.forward(&[0.1, 0.2, 0.3]).unwrap());
    }

    #[test]
    fn test_invalid_descriptor() {
        let mut d = network().to_descriptor();
        d.parameters.pop();
        assert!(matches!(
            NeuralNetwork::from_descriptor(&d),
            Err(NeuroptError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            NeuralNetwork::from_json("{not json"),
            Err(NeuroptError::Serialization(_))
        ));
    }

    #[test]
    fn test_json_with_invalid_layers_is_rejected() {
        let empty = r#"{"layers":[],"parameters":[]}"#;
        assert!(NeuralNetwork::from_json(empty).is_err());

        let mut d = network().to_descriptor();
        d.probabilistic = None;
        d.bounding = Some(BoundingLayer::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap());
        let json = d.to_json().unwrap();
        assert!(NeuralNetwork::from_json(&json).is_ok());

        let mut v: serde_json::Value = serde_json::from_str(&json).unwrap();
        v["bounding"]["upper"] = serde_json::json!([-1.0, 1.0]);
        let inverted = v.to_string();
        assert!(matches!(
            NeuralNetwork::from_json(&inverted),
            Err(NeuroptError::Serialization(_))
        ));
    }
}
