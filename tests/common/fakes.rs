//! Native script doubles
//!
//! `FakeLoader` accepts sources of the form `fake:<gain>` and produces a
//! `FakeGain` instance that multiplies audio by its control 0 value.

use scriptnode_rs::{
    error::{Result, ScriptError},
    node::{Port, PortDirection, PortType},
    parameter::{Parameter, ParameterRange, SharedParameter},
    AudioBuffer, BufferPipe, ScriptInstance, ScriptLoader,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Counters shared between a loader and the instances it produced
#[derive(Debug, Default)]
pub struct FakeStats {
    pub validations: AtomicUsize,
    pub compiles: AtomicUsize,
    pub prepares: AtomicUsize,
    pub releases: AtomicUsize,
    pub processed: AtomicUsize,
}

impl FakeStats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Loader for `fake:<initial gain>` sources
#[derive(Debug, Default)]
pub struct FakeLoader {
    pub stats: Arc<FakeStats>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(code: &str) -> Option<f32> {
        code.strip_prefix("fake:")?.trim().parse().ok()
    }
}

impl ScriptLoader for FakeLoader {
    fn validate(&self, code: &str) -> Result<()> {
        self.stats.validations.fetch_add(1, Ordering::SeqCst);
        if code.starts_with("fake:") {
            Ok(())
        } else {
            Err(ScriptError::Validation("missing fake: prefix".to_string()))
        }
    }

    fn compile(&self, code: &str) -> Result<Box<dyn ScriptInstance>> {
        self.stats.compiles.fetch_add(1, Ordering::SeqCst);
        let gain = Self::parse(code)
            .ok_or_else(|| ScriptError::Compile(format!("bad gain in '{}'", code)))?;
        Ok(Box::new(FakeGain::new(code, gain, self.stats.clone())))
    }
}

/// Native gain instance with one control input
pub struct FakeGain {
    source: String,
    ports: Vec<Port>,
    gain: SharedParameter,
    blob: Vec<u8>,
    prepared: bool,
    stats: Arc<FakeStats>,
}

impl FakeGain {
    pub fn new(source: &str, gain: f32, stats: Arc<FakeStats>) -> Self {
        let range = ParameterRange::new(0.0, 2.0, gain);
        Self {
            source: source.to_string(),
            ports: vec![
                Port::input(PortType::Audio, 0),
                Port::output(PortType::Audio, 0),
                Port::control(PortDirection::Input, 0, range).with_name("Gain"),
            ],
            gain: Parameter::shared(0, true, "Gain", range),
            blob: Vec::new(),
            prepared: false,
            stats,
        }
    }
}

impl ScriptInstance for FakeGain {
    fn source(&self) -> &str {
        &self.source
    }

    fn name(&self) -> &str {
        "Fake Gain"
    }

    fn ports(&self) -> &[Port] {
        &self.ports
    }

    fn parameter(&self, channel: u32, input: bool) -> SharedParameter {
        match self.find_parameter(channel, input) {
            Some(p) => p,
            None => Parameter::shared(channel, input, "Unused", ParameterRange::default()),
        }
    }

    fn find_parameter(&self, channel: u32, input: bool) -> Option<SharedParameter> {
        (channel == 0 && input).then(|| self.gain.clone())
    }

    fn for_each_parameter(&self, f: &mut dyn FnMut(&SharedParameter)) {
        f(&self.gain);
    }

    fn prepare(&mut self, _sample_rate: f64, _block_size: usize) -> Result<()> {
        if !self.prepared {
            self.prepared = true;
            self.stats.prepares.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn process(&mut self, audio: &mut AudioBuffer, _midi: &mut BufferPipe<'_>) -> Result<()> {
        audio.apply_gain(self.gain.value());
        self.stats.processed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        if self.prepared {
            self.prepared = false;
            self.stats.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn save(&mut self) -> Result<Vec<u8>> {
        Ok(self.blob.clone())
    }

    fn restore(&mut self, data: &[u8]) -> Result<()> {
        self.blob = data.to_vec();
        Ok(())
    }

    fn is_prepared(&self) -> bool {
        self.prepared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_loader_parses_gain() {
        let loader = FakeLoader::new();
        assert!(loader.validate("fake:0.5").is_ok());
        assert!(loader.validate("real code").is_err());

        let instance = loader.compile("fake:0.5").unwrap();
        assert_eq!(instance.ports().len(), 3);
        assert_eq!(instance.parameter(0, true).value(), 0.5);
        assert!(loader.compile("fake:loud").is_err());
    }
}
