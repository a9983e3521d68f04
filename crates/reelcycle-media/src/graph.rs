//! Filter graph builder.
//!
//! Chains are added in topological order: every labeled pin a chain consumes
//! must have been produced by an earlier chain. [`FilterGraph::compile`]
//! checks the graph before serializing it to FFmpeg's `-filter_complex`
//! syntax:
//! - labels are unique and well formed
//! - input stream references stay within the declared input count
//! - every label is consumed exactly once, except the two output pins
//! - exactly one video and one audio output pin are designated

use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Kind of stream selected from a numbered input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    fn specifier(&self) -> char {
        match self {
            StreamKind::Video => 'v',
            StreamKind::Audio => 'a',
        }
    }
}

/// An edge endpoint: either an input file's stream or a labeled pin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pin {
    Input { index: usize, kind: StreamKind },
    Label(String),
}

impl Pin {
    pub fn video(index: usize) -> Self {
        Pin::Input {
            index,
            kind: StreamKind::Video,
        }
    }

    pub fn audio(index: usize) -> Self {
        Pin::Input {
            index,
            kind: StreamKind::Audio,
        }
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pin::Input { index, kind } => write!(f, "[{}:{}]", index, kind.specifier()),
            Pin::Label(label) => write!(f, "[{}]", label),
        }
    }
}

/// A single filter with its `:`-separated arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: String,
    args: Vec<String>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// A pre-written filter chain inserted verbatim (e.g. a look profile).
    pub fn raw(chain: impl Into<String>) -> Self {
        Self::new(chain)
    }

    /// Positional argument.
    pub fn arg(mut self, value: impl fmt::Display) -> Self {
        self.args.push(value.to_string());
        self
    }

    /// Named argument.
    pub fn kv(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.args.push(format!("{}={}", key, value));
        self
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}={}", self.name, self.args.join(":"))
        }
    }
}

/// Errors detected while compiling a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("chain {0} has no filters")]
    EmptyChain(usize),

    #[error("chain {0} has no output pins")]
    NoOutputs(usize),

    #[error("invalid pin label {0:?}")]
    InvalidLabel(String),

    #[error("pin [{0}] is produced more than once")]
    DuplicateLabel(String),

    #[error("pin [{0}] is consumed before it is produced")]
    UnknownLabel(String),

    #[error("pin [{0}] is consumed more than once")]
    LabelConsumedTwice(String),

    #[error("pin [{0}] is never consumed")]
    DanglingLabel(String),

    #[error("input {index} referenced but only {count} inputs declared")]
    InputOutOfRange { index: usize, count: usize },

    #[error("output pin {0} must be a produced label")]
    InvalidOutput(String),

    #[error("video and audio outputs must be distinct pins")]
    SharedOutput,
}

#[derive(Debug, Clone)]
struct Chain {
    inputs: Vec<Pin>,
    filters: Vec<Filter>,
    outputs: Vec<String>,
}

/// A filter graph under construction.
#[derive(Debug, Clone)]
pub struct FilterGraph {
    input_count: usize,
    chains: Vec<Chain>,
}

/// A validated graph plus its designated output pins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledGraph {
    /// `-filter_complex` argument
    pub description: String,
    /// Video output label (without brackets)
    pub video_out: String,
    /// Audio output label (without brackets)
    pub audio_out: String,
}

impl FilterGraph {
    /// Graph over `input_count` numbered inputs.
    pub fn new(input_count: usize) -> Self {
        Self {
            input_count,
            chains: Vec::new(),
        }
    }

    /// Raise the declared input count (inputs are usually registered as the graph grows).
    pub fn set_input_count(&mut self, input_count: usize) {
        self.input_count = input_count;
    }

    /// Add a chain with a single output pin and return that pin.
    pub fn chain<I>(&mut self, inputs: I, filters: Vec<Filter>, output: &str) -> Pin
    where
        I: IntoIterator<Item = Pin>,
    {
        self.chains.push(Chain {
            inputs: inputs.into_iter().collect(),
            filters,
            outputs: vec![output.to_string()],
        });
        Pin::Label(output.to_string())
    }

    /// Add a chain with several output pins (e.g. `split`).
    pub fn chain_multi<I>(&mut self, inputs: I, filters: Vec<Filter>, outputs: &[&str]) -> Vec<Pin>
    where
        I: IntoIterator<Item = Pin>,
    {
        self.chains.push(Chain {
            inputs: inputs.into_iter().collect(),
            filters,
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        });
        outputs.iter().map(|s| Pin::Label(s.to_string())).collect()
    }

    /// Validate and serialize.
    pub fn compile(&self, video_out: &Pin, audio_out: &Pin) -> Result<CompiledGraph, GraphError> {
        let mut produced: HashSet<&str> = HashSet::new();
        let mut consumed: HashMap<&str, usize> = HashMap::new();

        for (i, chain) in self.chains.iter().enumerate() {
            if chain.filters.is_empty() {
                return Err(GraphError::EmptyChain(i));
            }
            if chain.outputs.is_empty() {
                return Err(GraphError::NoOutputs(i));
            }

            for pin in &chain.inputs {
                match pin {
                    Pin::Input { index, .. } => {
                        if *index >= self.input_count {
                            return Err(GraphError::InputOutOfRange {
                                index: *index,
                                count: self.input_count,
                            });
                        }
                    }
                    Pin::Label(label) => {
                        if !produced.contains(label.as_str()) {
                            return Err(GraphError::UnknownLabel(label.clone()));
                        }
                        let uses = consumed.entry(label.as_str()).or_insert(0);
                        *uses += 1;
                        if *uses > 1 {
                            return Err(GraphError::LabelConsumedTwice(label.clone()));
                        }
                    }
                }
            }

            for label in &chain.outputs {
                if !is_valid_label(label) {
                    return Err(GraphError::InvalidLabel(label.clone()));
                }
                if !produced.insert(label.as_str()) {
                    return Err(GraphError::DuplicateLabel(label.clone()));
                }
            }
        }

        let video = output_label(video_out, &produced, &consumed)?;
        let audio = output_label(audio_out, &produced, &consumed)?;
        if video == audio {
            return Err(GraphError::SharedOutput);
        }

        for chain in &self.chains {
            for label in &chain.outputs {
                let is_output = label == video || label == audio;
                if !is_output && !consumed.contains_key(label.as_str()) {
                    return Err(GraphError::DanglingLabel(label.clone()));
                }
            }
        }

        Ok(CompiledGraph {
            description: self.serialize(),
            video_out: video.to_string(),
            audio_out: audio.to_string(),
        })
    }

    fn serialize(&self) -> String {
        self.chains
            .iter()
            .map(|chain| {
                let mut out = String::new();
                for pin in &chain.inputs {
                    out.push_str(&pin.to_string());
                }
                let filters: Vec<String> = chain.filters.iter().map(ToString::to_string).collect();
                out.push_str(&filters.join(","));
                for label in &chain.outputs {
                    out.push('[');
                    out.push_str(label);
                    out.push(']');
                }
                out
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

fn output_label<'a>(
    pin: &'a Pin,
    produced: &HashSet<&str>,
    consumed: &HashMap<&str, usize>,
) -> Result<&'a str, GraphError> {
    match pin {
        Pin::Label(label) if produced.contains(label.as_str()) && !consumed.contains_key(label.as_str()) => {
            Ok(label.as_str())
        }
        other => Err(GraphError::InvalidOutput(other.to_string())),
    }
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}
