//! Wire types shared with the training backend.
//!
//! Field names and defaults mirror the backend's JSON contract exactly; the
//! client never invents fields the server does not send.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Control token sent to the backend right after the connection opens.
pub const START_TOKEN: &str = "START";
/// Control token sent to the backend right before a deliberate close.
pub const STOP_TOKEN: &str = "STOP";
/// Status value marking the terminal frame of a training run.
pub const COMPLETED_STATUS: &str = "completed";

/// Environments the backend can simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentKind {
    Gridworld,
    Cartpole,
    Frozenlake,
    Mountaincar,
    Breakout,
    #[serde(rename = "gym4real_dam")]
    Gym4RealDam,
}

impl EnvironmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentKind::Gridworld => "gridworld",
            EnvironmentKind::Cartpole => "cartpole",
            EnvironmentKind::Frozenlake => "frozenlake",
            EnvironmentKind::Mountaincar => "mountaincar",
            EnvironmentKind::Breakout => "breakout",
            EnvironmentKind::Gym4RealDam => "gym4real_dam",
        }
    }
}

impl fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gridworld" => Ok(EnvironmentKind::Gridworld),
            "cartpole" => Ok(EnvironmentKind::Cartpole),
            "frozenlake" => Ok(EnvironmentKind::Frozenlake),
            "mountaincar" => Ok(EnvironmentKind::Mountaincar),
            "breakout" => Ok(EnvironmentKind::Breakout),
            "gym4real_dam" => Ok(EnvironmentKind::Gym4RealDam),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Algorithms the backend can train with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    PolicyIteration,
    ValueIteration,
    QLearning,
    Sarsa,
    MonteCarlo,
    TdLearning,
    NStepTd,
}

impl AlgorithmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmKind::PolicyIteration => "policy_iteration",
            AlgorithmKind::ValueIteration => "value_iteration",
            AlgorithmKind::QLearning => "q_learning",
            AlgorithmKind::Sarsa => "sarsa",
            AlgorithmKind::MonteCarlo => "monte_carlo",
            AlgorithmKind::TdLearning => "td_learning",
            AlgorithmKind::NStepTd => "n_step_td",
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "policy_iteration" => Ok(AlgorithmKind::PolicyIteration),
            "value_iteration" => Ok(AlgorithmKind::ValueIteration),
            "q_learning" => Ok(AlgorithmKind::QLearning),
            "sarsa" => Ok(AlgorithmKind::Sarsa),
            "monte_carlo" => Ok(AlgorithmKind::MonteCarlo),
            "td_learning" => Ok(AlgorithmKind::TdLearning),
            "n_step_td" => Ok(AlgorithmKind::NStepTd),
            other => Err(format!("unknown algorithm '{other}'")),
        }
    }
}

/// Configuration submitted when starting a training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub environment: EnvironmentKind,
    pub algorithm: AlgorithmKind,
    pub discount_factor: f64,
    pub learning_rate: f64,
    pub epsilon: f64,
    pub n_episodes: u32,
    pub max_steps: u32,
    pub n_step: u32,
    pub step_delay_ms: u32,
}

impl TrainingConfig {
    /// Config with the backend's documented defaults for everything but the
    /// environment/algorithm pair.
    pub fn new(environment: EnvironmentKind, algorithm: AlgorithmKind) -> Self {
        Self {
            environment,
            algorithm,
            discount_factor: 0.99,
            learning_rate: 0.1,
            epsilon: 0.1,
            n_episodes: 1000,
            max_steps: 500,
            n_step: 1,
            step_delay_ms: 200,
        }
    }
}

/// Raw environment state carried inside an update.
///
/// The shape varies per environment: a scalar index for tabular grids, a
/// numeric vector for control tasks, a structured object for everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Index(i64),
    Vector(Vec<f64>),
    Object(serde_json::Value),
}

/// One step-level event emitted by the training backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingUpdate {
    pub episode: u32,
    pub step: u32,
    pub reward: f64,
    pub cumulative_reward: f64,
    pub state: StateValue,
    pub action: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_function: Option<HashMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<HashMap<String, i64>>,
}

/// Response to a successful start request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub session_id: String,
    pub status: String,
}

/// Opaque acknowledgement returned by stop/delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusAck {
    pub status: String,
}

/// Live status of a training session as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingStatus {
    pub session_id: String,
    pub is_running: bool,
    pub current_episode: u32,
    pub total_episodes: u32,
    pub elapsed_time: f64,
    pub config: TrainingConfig,
}

/// Descriptor for a state or action space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceInfo {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<i64>,
}

/// Catalog entry describing an available environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub state_space: SpaceInfo,
    pub action_space: SpaceInfo,
    pub max_episode_steps: u32,
}

/// Catalog entry describing an available algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub requires_model: bool,
    pub compatible_environments: Vec<String>,
    pub parameters: HashMap<String, serde_json::Value>,
}

/// A classified inbound frame from the push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// The run finished; no further updates are expected.
    Completed,
    /// A regular step-level update.
    Update(Box<TrainingUpdate>),
}

/// Classify one inbound text frame.
///
/// A frame whose `status` field equals [`COMPLETED_STATUS`] is the terminal
/// completion signal; anything else must parse as a [`TrainingUpdate`].
pub fn classify_frame(raw: &str) -> Result<InboundFrame, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    if value.get("status").and_then(|s| s.as_str()) == Some(COMPLETED_STATUS) {
        return Ok(InboundFrame::Completed);
    }
    let update: TrainingUpdate = serde_json::from_value(value)?;
    Ok(InboundFrame::Update(Box::new(update)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completion_frame_is_classified_as_completed() {
        let frame = classify_frame(r#"{"status": "completed"}"#).unwrap();
        assert_eq!(frame, InboundFrame::Completed);
    }

    #[test]
    fn step_frame_is_classified_as_update() {
        let raw = json!({
            "episode": 3,
            "step": 17,
            "reward": -1.0,
            "cumulative_reward": -17.0,
            "state": 42,
            "action": 2,
        })
        .to_string();

        match classify_frame(&raw).unwrap() {
            InboundFrame::Update(update) => {
                assert_eq!(update.episode, 3);
                assert_eq!(update.step, 17);
                assert_eq!(update.state, StateValue::Index(42));
                assert!(update.value_function.is_none());
                assert!(update.policy.is_none());
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn malformed_frame_is_an_error() {
        assert!(classify_frame("not json at all").is_err());
        // Well-formed JSON that is neither a completion nor an update.
        assert!(classify_frame(r#"{"status": "running"}"#).is_err());
    }

    #[test]
    fn state_payload_is_polymorphic() {
        let scalar: StateValue = serde_json::from_str("7").unwrap();
        assert_eq!(scalar, StateValue::Index(7));

        let vector: StateValue = serde_json::from_str("[0.5, -1.25, 3]").unwrap();
        assert_eq!(vector, StateValue::Vector(vec![0.5, -1.25, 3.0]));

        let object: StateValue = serde_json::from_str(r#"{"level": 0.8, "inflow": 12}"#).unwrap();
        assert!(matches!(object, StateValue::Object(_)));
    }

    #[test]
    fn update_carries_optional_snapshots() {
        let raw = json!({
            "episode": 50,
            "step": 1,
            "reward": 1.0,
            "cumulative_reward": 1.0,
            "state": 0,
            "action": 1,
            "value_function": {"0": 0.25, "1": 0.75},
            "policy": {"0": 1, "1": 3},
        })
        .to_string();

        match classify_frame(&raw).unwrap() {
            InboundFrame::Update(update) => {
                let vf = update.value_function.unwrap();
                assert_eq!(vf.get("1"), Some(&0.75));
                let policy = update.policy.unwrap();
                assert_eq!(policy.get("1"), Some(&3));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn kind_enums_round_trip_their_wire_names() {
        assert_eq!(
            serde_json::to_string(&EnvironmentKind::Gym4RealDam).unwrap(),
            "\"gym4real_dam\""
        );
        assert_eq!(
            serde_json::to_string(&AlgorithmKind::NStepTd).unwrap(),
            "\"n_step_td\""
        );
        assert_eq!("q_learning".parse::<AlgorithmKind>().unwrap(), AlgorithmKind::QLearning);
        assert_eq!(
            "gym4real_dam".parse::<EnvironmentKind>().unwrap(),
            EnvironmentKind::Gym4RealDam
        );
        assert!("dqn".parse::<AlgorithmKind>().is_err());
    }

    #[test]
    fn config_defaults_match_the_backend() {
        let config = TrainingConfig::new(EnvironmentKind::Gridworld, AlgorithmKind::QLearning);
        assert_eq!(config.discount_factor, 0.99);
        assert_eq!(config.learning_rate, 0.1);
        assert_eq!(config.epsilon, 0.1);
        assert_eq!(config.n_episodes, 1000);
        assert_eq!(config.max_steps, 500);
        assert_eq!(config.n_step, 1);
        assert_eq!(config.step_delay_ms, 200);
    }
}
