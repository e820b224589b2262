use super::OptimizerService;
use crate::error::CompressionFailure;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockOptimizer {
    output: Arc<Mutex<Option<Vec<u8>>>>,
    failure: Arc<Mutex<Option<CompressionFailure>>>,
    inputs: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockOptimizer {
    pub fn new() -> Self {
        Self {
            output: Arc::new(Mutex::new(None)),
            failure: Arc::new(Mutex::new(None)),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Return these bytes from every call instead of halving the input.
    pub fn with_output(self, output: Vec<u8>) -> Self {
        *self.output.lock().unwrap() = Some(output);
        self
    }

    pub fn with_failure(self, failure: CompressionFailure) -> Self {
        *self.failure.lock().unwrap() = Some(failure);
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }

    pub fn get_inputs(&self) -> Vec<Vec<u8>> {
        self.inputs.lock().unwrap().clone()
    }
}

impl Default for MockOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OptimizerService for MockOptimizer {
    async fn optimize(&self, source: &[u8]) -> Result<Vec<u8>> {
        self.inputs.lock().unwrap().push(source.to_vec());

        if let Some(kind) = *self.failure.lock().unwrap() {
            return Err(Error::compression(kind, "Mock failure"));
        }

        match self.output.lock().unwrap().as_ref() {
            Some(output) => Ok(output.clone()),
            None => Ok(source[..source.len().div_ceil(2)].to_vec()),
        }
    }
}
